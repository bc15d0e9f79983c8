use std::net::SocketAddr;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{auth, routes};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::router())
        .merge(auth::router())
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod flow_tests {
    use std::{collections::HashMap, sync::Arc};

    use axum::{
        body::{Body, Bytes},
        http::{header, HeaderMap, Method, Request, StatusCode},
    };
    use cookie::Cookie;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::build_app;
    use crate::auth::{
        repo::{SqliteUserStore, StoreError, UserStore},
        repo_types::User,
        session::SESSION_COOKIE,
    };
    use crate::db;
    use crate::state::AppState;

    struct Reply {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    }

    impl Reply {
        fn location(&self) -> Option<&str> {
            self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
        }

        fn text(&self) -> String {
            String::from_utf8_lossy(&self.body).into_owned()
        }
    }

    /// Browser stand-in: keeps cookies between requests, does not follow redirects.
    struct Client {
        state: AppState,
        app: axum::Router,
        cookies: HashMap<String, String>,
    }

    impl Client {
        async fn new() -> Self {
            Self::with_state(AppState::fake().await)
        }

        fn with_state(state: AppState) -> Self {
            let app = build_app(state.clone());
            Self {
                state,
                app,
                cookies: HashMap::new(),
            }
        }

        /// Second browser against the same server.
        fn fork(&self) -> Self {
            Self {
                state: self.state.clone(),
                app: self.app.clone(),
                cookies: HashMap::new(),
            }
        }

        fn has_session(&self) -> bool {
            self.cookies.contains_key(SESSION_COOKIE)
        }

        async fn send(&mut self, mut req: Request<Body>) -> Reply {
            if !self.cookies.is_empty() {
                let jar = self
                    .cookies
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join("; ");
                req.headers_mut()
                    .insert(header::COOKIE, jar.parse().unwrap());
            }

            let res = self.app.clone().oneshot(req).await.unwrap();
            for value in res.headers().get_all(header::SET_COOKIE) {
                let cookie = Cookie::parse(value.to_str().unwrap().to_string()).unwrap();
                if cookie.max_age() == Some(cookie::time::Duration::ZERO) {
                    self.cookies.remove(cookie.name());
                } else {
                    self.cookies
                        .insert(cookie.name().to_string(), cookie.value().to_string());
                }
            }

            let status = res.status();
            let headers = res.headers().clone();
            let body = res.into_body().collect().await.unwrap().to_bytes();
            Reply {
                status,
                headers,
                body,
            }
        }

        async fn get(&mut self, uri: &str) -> Reply {
            let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
            self.send(req).await
        }

        async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> Reply {
            let body = fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            let req = Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap();
            self.send(req).await
        }

        async fn register(&mut self, name: &str, email: &str, password: &str) -> Reply {
            self.post_form(
                "/register",
                &[("name", name), ("email", email), ("password", password)],
            )
            .await
        }

        async fn login(&mut self, email: &str, password: &str) -> Reply {
            self.post_form("/login", &[("email", email), ("password", password)])
                .await
        }
    }

    fn cheat_sheet() -> Vec<u8> {
        std::fs::read(concat!(env!("CARGO_MANIFEST_DIR"), "/static/files/cheat_sheet.pdf")).unwrap()
    }

    #[tokio::test]
    async fn register_authenticates_and_shows_name() {
        let mut client = Client::new().await;

        let res = client.register("Alice", "a@x.com", "pw1").await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location(), Some("/secrets"));
        assert!(client.has_session());

        let stored = client.state.users.find_by_email("a@x.com").await.unwrap();
        assert_eq!(stored.unwrap().name, "Alice");

        let page = client.get("/secrets").await;
        assert_eq!(page.status, StatusCode::OK);
        assert!(page.text().contains("Welcome, Alice"));
    }

    #[tokio::test]
    async fn registration_normalizes_email() {
        let mut client = Client::new().await;
        client.register("Alice", "  A@X.com ", "pw1").await;
        assert!(client.state.users.find_by_email("a@x.com").await.unwrap().is_some());

        let mut other = client.fork();
        let res = other.login("a@x.com", "pw1").await;
        assert_eq!(res.location(), Some("/secrets"));
    }

    #[tokio::test]
    async fn duplicate_registration_leaves_store_unchanged() {
        let mut alice = Client::new().await;
        alice.register("Alice", "a@x.com", "pw1").await;
        let original = alice.state.users.find_by_email("a@x.com").await.unwrap().unwrap();

        let mut mallory = alice.fork();
        let res = mallory.register("Mallory", "a@x.com", "other").await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location(), Some("/login"));
        assert!(!mallory.has_session());

        let kept = alice.state.users.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(kept.id, original.id);
        assert_eq!(kept.name, "Alice");
        assert_eq!(kept.password_hash, original.password_hash);

        let page = mallory.get("/login").await;
        assert!(page.text().contains("already signed up"));
    }

    /// Lookups never see existing rows, so every registration reaches the
    /// insert, as when two registrations for one email interleave.
    struct LookupBlindStore(SqliteUserStore);

    #[async_trait::async_trait]
    impl UserStore for LookupBlindStore {
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }

        async fn create(&self, name: &str, email: &str, password_hash: &str) -> Result<User, StoreError> {
            self.0.create(name, email, password_hash).await
        }

        async fn find_by_id(&self, id: i64) -> Result<User, StoreError> {
            self.0.find_by_id(id).await
        }
    }

    #[tokio::test]
    async fn duplicate_email_caught_at_insert_starts_no_session() {
        let pool = db::memory().await;
        let users = Arc::new(LookupBlindStore(SqliteUserStore::new(pool.clone())));
        let mut first = Client::with_state(AppState::from_parts(users, AppState::test_config()));
        let mut second = first.fork();

        let res = first.register("Alice", "a@x.com", "pw1").await;
        assert_eq!(res.location(), Some("/secrets"));
        assert!(first.has_session());

        let res = second.register("Mallory", "a@x.com", "other").await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location(), Some("/login"));
        assert!(!second.has_session());
        assert!(second.get("/login").await.text().contains("already signed up"));

        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
        let (name,): (String,) = sqlx::query_as("SELECT name FROM users WHERE email = ?")
            .bind("a@x.com")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(name, "Alice");
    }

    #[tokio::test]
    async fn invalid_registration_input_is_rejected() {
        let mut client = Client::new().await;

        let res = client.register("Alice", "not-an-email", "pw1").await;
        assert_eq!(res.location(), Some("/register"));
        assert!(!client.has_session());

        let res = client.register("", "a@x.com", "pw1").await;
        assert_eq!(res.location(), Some("/register"));

        let res = client.register("Alice", "a@x.com", "").await;
        assert_eq!(res.location(), Some("/register"));

        assert!(client.state.users.find_by_email("a@x.com").await.unwrap().is_none());
        assert!(!client.has_session());
    }

    #[tokio::test]
    async fn login_with_correct_password() {
        let mut alice = Client::new().await;
        alice.register("Alice", "a@x.com", "pw1").await;

        let mut browser = alice.fork();
        let res = browser.login("a@x.com", "pw1").await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location(), Some("/secrets"));
        assert!(browser.has_session());

        let page = browser.get("/secrets").await;
        assert!(page.text().contains("Welcome, Alice"));
    }

    #[tokio::test]
    async fn login_with_wrong_password_starts_no_session() {
        let mut alice = Client::new().await;
        alice.register("Alice", "a@x.com", "pw1").await;

        let mut browser = alice.fork();
        let res = browser.login("a@x.com", "pw2").await;
        assert_eq!(res.location(), Some("/login"));
        assert!(!browser.has_session());

        let page = browser.get("/login").await;
        assert!(page.text().contains("Password incorrect"));

        // Flash is consumed once shown.
        let again = browser.get("/login").await;
        assert!(!again.text().contains("Password incorrect"));
    }

    #[tokio::test]
    async fn login_with_unknown_email_starts_no_session() {
        let mut browser = Client::new().await;
        let res = browser.login("nobody@x.com", "pw").await;
        assert_eq!(res.location(), Some("/login"));
        assert!(!browser.has_session());

        let page = browser.get("/login").await;
        assert!(page.text().contains("does not exist"));
    }

    #[tokio::test]
    async fn logout_ends_session() {
        let mut client = Client::new().await;
        client.register("Alice", "a@x.com", "pw1").await;
        assert!(client.has_session());

        let res = client.get("/logout").await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location(), Some("/"));
        assert!(!client.has_session());

        let res = client.get("/secrets").await;
        assert_eq!(res.location(), Some("/login"));
    }

    #[tokio::test]
    async fn logout_while_anonymous_redirects_home() {
        let mut client = Client::new().await;
        let res = client.get("/logout").await;
        assert_eq!(res.location(), Some("/"));
    }

    #[tokio::test]
    async fn anonymous_secrets_redirects_to_login() {
        let mut client = Client::new().await;
        let res = client.get("/secrets").await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location(), Some("/login"));
        assert!(!res.text().contains("Welcome"));

        let page = client.get("/login").await;
        assert!(page.text().contains("Please log in to access this page."));
    }

    #[tokio::test]
    async fn anonymous_download_returns_no_bytes() {
        let mut client = Client::new().await;
        for method in [Method::GET, Method::POST] {
            let req = Request::builder()
                .method(method)
                .uri("/download")
                .body(Body::empty())
                .unwrap();
            let res = client.send(req).await;
            assert_eq!(res.status, StatusCode::SEE_OTHER);
            assert_eq!(res.location(), Some("/login"));
            assert!(res.body.is_empty());
        }
    }

    #[tokio::test]
    async fn authenticated_download_returns_fixed_file() {
        let mut client = Client::new().await;
        client.register("Alice", "a@x.com", "pw1").await;

        let res = client.get("/download").await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            res.headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"cheat_sheet.pdf\""
        );
        assert_eq!(res.body.as_ref(), cheat_sheet().as_slice());
    }

    #[tokio::test]
    async fn download_ignores_request_parameters() {
        let mut client = Client::new().await;
        client.register("Alice", "a@x.com", "pw1").await;

        let res = client
            .get("/download?path=../../Cargo.toml&file=/etc/passwd")
            .await;
        assert_eq!(res.body.as_ref(), cheat_sheet().as_slice());

        let res = client
            .post_form("/download", &[("path", "../Cargo.toml")])
            .await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body.as_ref(), cheat_sheet().as_slice());

        let req = Request::builder()
            .uri("/download")
            .header(header::RANGE, "bytes=0-3")
            .body(Body::empty())
            .unwrap();
        let res = client.send(req).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body.as_ref(), cheat_sheet().as_slice());
    }

    #[tokio::test]
    async fn stale_session_forces_login_and_clears_cookie() {
        let mut client = Client::new().await;
        let cookie = client.state.sessions.start(999).unwrap();
        client
            .cookies
            .insert(cookie.name().to_string(), cookie.value().to_string());

        let res = client.get("/secrets").await;
        assert_eq!(res.location(), Some("/login"));
        assert!(!client.has_session());

        let page = client.get("/login").await;
        assert!(page.text().contains("no longer valid"));
    }

    #[tokio::test]
    async fn forged_session_is_anonymous() {
        let mut client = Client::new().await;
        client.register("Alice", "a@x.com", "pw1").await;
        let token = client.cookies.get(SESSION_COOKIE).unwrap().clone();
        client
            .cookies
            .insert(SESSION_COOKIE.to_string(), format!("{}x", token));

        let res = client.get("/secrets").await;
        assert_eq!(res.location(), Some("/login"));
    }

    #[tokio::test]
    async fn home_reports_authentication_status() {
        let mut client = Client::new().await;
        let page = client.get("/").await;
        assert_eq!(page.status, StatusCode::OK);
        assert!(page.text().contains("You are not logged in."));

        client.register("Alice", "a@x.com", "pw1").await;
        let page = client.get("/").await;
        assert!(page.text().contains("You are logged in."));
    }

    #[tokio::test]
    async fn form_pages_render() {
        let mut client = Client::new().await;
        let page = client.get("/register").await;
        assert_eq!(page.status, StatusCode::OK);
        assert!(page.text().contains(r#"action="/register""#));

        let page = client.get("/login").await;
        assert_eq!(page.status, StatusCode::OK);
        assert!(page.text().contains(r#"action="/login""#));
    }

    #[tokio::test]
    async fn health_is_public() {
        let mut client = Client::new().await;
        let res = client.get("/health").await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.text(), "ok");
    }
}
