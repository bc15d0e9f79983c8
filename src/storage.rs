use std::path::PathBuf;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::warn;

/// Read-only directory of downloadable files.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Streams `name` from the store as an attachment.
    ///
    /// Only `'static` names are accepted: the file is always chosen by the
    /// server, never by the request.
    pub async fn send(&self, name: &'static str) -> Response {
        let path = self.root.join(name);
        // Fresh GET so client headers (ranges, conditionals) and method never reach the file service.
        let req = Request::new(Body::empty());

        let res = match ServeFile::new(&path).oneshot(req).await {
            Ok(res) => res,
            Err(never) => match never {},
        };

        let mut res = res.map(Body::new);
        if res.status().is_success() {
            let disposition = format!("attachment; filename=\"{}\"", name);
            if let Ok(value) = HeaderValue::from_str(&disposition) {
                res.headers_mut().insert(header::CONTENT_DISPOSITION, value);
            }
        } else {
            warn!(path = %path.display(), status = %res.status(), "download file unavailable");
        }
        res
    }
}
