use axum::{extract::State, response::Response};
use tracing::{info, instrument};

use crate::{auth::extractors::CurrentUser, state::AppState};

/// The only file this route ever serves.
pub const DOWNLOAD_FILE: &str = "cheat_sheet.pdf";

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn download(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Response {
    info!(file = DOWNLOAD_FILE, "download");
    state.files.send(DOWNLOAD_FILE).await
}
