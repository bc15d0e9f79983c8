use crate::auth::{
    repo::{SqliteUserStore, UserStore},
    session::SessionKeys,
};
use crate::config::AppConfig;
use crate::db;
use crate::storage::FileStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub sessions: SessionKeys,
    pub files: FileStore,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = db::connect(&config.database_url, config.max_connections).await?;
        db::migrate(&pool).await?;

        let users = Arc::new(SqliteUserStore::new(pool)) as Arc<dyn UserStore>;
        Ok(Self::from_parts(users, config))
    }

    pub fn from_parts(users: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        Self {
            users,
            sessions: SessionKeys::new(&config.session),
            files: FileStore::new(config.files_dir.clone()),
            config,
        }
    }

    /// In-memory database, test secret and the repo's bundled files.
    #[cfg(test)]
    pub async fn fake() -> Self {
        let users = Arc::new(SqliteUserStore::new(db::memory().await)) as Arc<dyn UserStore>;
        Self::from_parts(users, Self::test_config())
    }

    #[cfg(test)]
    pub fn test_config() -> Arc<AppConfig> {
        use crate::config::SessionConfig;

        Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            max_connections: 1,
            session: SessionConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
                ttl_minutes: 5,
                secure_cookie: false,
            },
            files_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/static/files").into(),
        })
    }
}
