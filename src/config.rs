use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
    pub verify_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetStoreConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base of the public URL handed back to clients.
    pub public_url: String,
    pub folder: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub require_verification: bool,
    pub assets: AssetStoreConfig,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub host: String,
    pub port: u16,
}

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = required("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "photodump".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "photodump-users".into()),
            ttl_minutes: parsed("JWT_TTL_MINUTES", 60),
            reset_ttl_minutes: parsed("JWT_RESET_TTL_MINUTES", 60),
            verify_ttl_minutes: parsed("JWT_VERIFY_TTL_MINUTES", 60),
        };

        let endpoint = required("ASSET_STORE_ENDPOINT")?;
        let bucket = required("ASSET_STORE_BUCKET")?;
        let public_url = std::env::var("ASSET_STORE_PUBLIC_URL")
            .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let assets = AssetStoreConfig {
            access_key: required("ASSET_STORE_ACCESS_KEY")?,
            secret_key: required("ASSET_STORE_SECRET_KEY")?,
            region: std::env::var("ASSET_STORE_REGION").unwrap_or_else(|_| "us-east-1".into()),
            folder: std::env::var("ASSET_STORE_FOLDER").unwrap_or_else(|_| "dumps".into()),
            public_url: public_url.trim_end_matches('/').to_string(),
            endpoint,
            bucket,
        };

        let cors_origins = split_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.into()),
        );

        Ok(Self {
            database_url,
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            require_verification: parsed("AUTH_REQUIRE_VERIFICATION", false),
            assets,
            cors_origins,
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parsed("APP_PORT", 8080),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("missing env var {key}"))
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}
