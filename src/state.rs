use std::sync::Arc;

use crate::auth::jwt::JwtKeys;
use crate::auth::repo::{PgUserRepo, UserRepo};
use crate::config::AppConfig;
use crate::db;
use crate::posts::repo::{PgPostRepo, PostRepo};
use crate::storage::{AssetStore, S3AssetStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Signing keys, built once from `config.jwt`.
    pub jwt: Arc<JwtKeys>,
    pub users: Arc<dyn UserRepo>,
    pub posts: Arc<dyn PostRepo>,
    pub assets: Arc<dyn AssetStore>,
}

impl AppState {
    /// Connects Postgres, creates the schema and builds the S3 client.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let pool = db::connect(&config).await?;
        db::migrate(&pool).await?;

        let assets = Arc::new(S3AssetStore::new(&config.assets).await?) as Arc<dyn AssetStore>;

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserRepo::new(pool.clone())),
            Arc::new(PgPostRepo::new(pool)),
            assets,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        posts: Arc<dyn PostRepo>,
        assets: Arc<dyn AssetStore>,
    ) -> Self {
        Self {
            jwt: Arc::new(JwtKeys::from(&config.jwt)),
            config,
            users,
            posts,
            assets,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// In-memory state for tests; no database or network.
    pub fn fake() -> Self {
        crate::testing::Harness::new().state
    }
}
