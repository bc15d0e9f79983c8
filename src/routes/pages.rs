use axum::response::Response;
use tracing::instrument;

use crate::{
    auth::{
        extractors::{CurrentUser, MaybeUser},
        flash::{self, Flash},
    },
    views,
};

#[instrument(skip_all)]
pub async fn home(user: MaybeUser, flash: Flash) -> Response {
    flash::render(&flash, views::home(user.logged_in(), flash.message()))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn secrets(CurrentUser(user): CurrentUser, flash: Flash) -> Response {
    flash::render(&flash, views::secrets(&user.name, flash.message()))
}
