//! Recsys service entry point
//!
//! Boots the store clients, bootstraps collections and tables, then serves
//! recommendation RPCs from the message bus until interrupted.

use std::sync::Arc;

use citypulse_core::clients::behavior::ClickHouseBehaviorLog;
use citypulse_core::clients::catalog::PostgresCatalog;
use citypulse_core::clients::embedding::HttpEmbedder;
use citypulse_core::clients::vector::QdrantVectorStore;
use citypulse_core::{config::load_dotenv, init_logging};
use citypulse_recsys::config::RecsysConfig;
use citypulse_recsys::rpc::RpcServer;
use citypulse_recsys::service::RecommendationService;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    init_logging();

    info!("Starting recsys service");
    let config = RecsysConfig::load()?;

    let vector = Arc::new(QdrantVectorStore::new(&config.vector)?);
    vector.ensure_collections().await?;

    let behavior = Arc::new(ClickHouseBehaviorLog::new(&config.behavior));
    behavior.ensure_tables().await?;

    let catalog = Arc::new(PostgresCatalog::new(&config.catalog).await?);
    catalog.ensure_schema().await?;

    let embedder = Arc::new(HttpEmbedder::new(&config.embedding)?);

    let service = Arc::new(RecommendationService::new(
        vector,
        behavior,
        catalog,
        embedder,
        config.recommend.clone(),
    ));

    let server = RpcServer::connect(&config.bus, service).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
        }
    }

    server.shutdown().await;
    Ok(())
}
