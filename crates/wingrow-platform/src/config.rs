use anyhow::{Context, Result};

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// `None` runs the service on the in-process store.
    pub database_url: Option<String>,
    pub http_addr: String,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub seed_catalog: bool,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        let database_url = non_empty_var("DATABASE_URL");
        let http_addr =
            std::env::var("HTTP_ADDR").unwrap_or_else(|_| default_http_addr.to_string());
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET is required")?;
        let jwt_issuer = non_empty_var("JWT_ISSUER");
        let seed_catalog = non_empty_var("SEED_CATALOG")
            .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));

        Ok(Self {
            database_url,
            http_addr,
            jwt_secret,
            jwt_issuer,
            seed_catalog,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
