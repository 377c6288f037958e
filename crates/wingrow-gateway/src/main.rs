mod app;
mod auth;
mod claims;
mod error;
mod extract;
mod inventory;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result as AnyResult;
use tracing::{info, warn};
use wingrow_core::{ClaimStore, InventoryStore};
use wingrow_inventory::DEFAULT_CATALOG;
use wingrow_platform::{PgStore, ServiceConfig, TokenVerifier, connect_database, ensure_schema};
use wingrow_store::MemoryStore;

use crate::app::{AppState, build_router};

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "wingrow_gateway=info,wingrow_claims=info,wingrow_inventory=info".to_string()
        }))
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:4000")?;
    let verifier = TokenVerifier::new(&config.jwt_secret, config.jwt_issuer.clone())?;

    let (claim_store, inventory_store): (Arc<dyn ClaimStore>, Arc<dyn InventoryStore>) =
        match &config.database_url {
            Some(database_url) => {
                let pool = connect_database(database_url).await?;
                ensure_schema(&pool).await?;
                let store = Arc::new(PgStore::new(pool));
                (
                    store.clone() as Arc<dyn ClaimStore>,
                    store as Arc<dyn InventoryStore>,
                )
            }
            None => {
                warn!("DATABASE_URL not set; using the in-memory store, data is lost on restart");
                let store = Arc::new(MemoryStore::new());
                (
                    store.clone() as Arc<dyn ClaimStore>,
                    store as Arc<dyn InventoryStore>,
                )
            }
        };

    let state = AppState::new(claim_store, inventory_store, verifier);
    if config.seed_catalog {
        state.ledger.seed_catalog(&DEFAULT_CATALOG).await?;
    }

    let router = build_router(state);
    let addr: SocketAddr = config.http_addr.parse()?;
    info!("gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
