//! Ingestion service entry point

use std::sync::Arc;

use citypulse_core::clients::catalog::PostgresCatalog;
use citypulse_core::clients::embedding::HttpEmbedder;
use citypulse_core::clients::vector::QdrantVectorStore;
use citypulse_core::{config::load_dotenv, init_logging};
use citypulse_ingestion::config::IngestionConfig;
use citypulse_ingestion::consumer::EventConsumer;
use citypulse_ingestion::pipeline::EventPipeline;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    init_logging();

    info!("Starting ingestion service");
    let config = IngestionConfig::load()?;

    let vector = Arc::new(QdrantVectorStore::new(&config.vector)?);
    vector.ensure_collections().await?;

    let catalog = Arc::new(PostgresCatalog::new(&config.catalog).await?);
    catalog.ensure_schema().await?;

    let embedder = Arc::new(HttpEmbedder::new(&config.embedding)?);

    let pipeline = Arc::new(EventPipeline::new(catalog, vector, embedder));
    let consumer = EventConsumer::connect(&config.bus, pipeline).await?;

    tokio::select! {
        result = consumer.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
        }
    }

    consumer.shutdown().await;
    Ok(())
}
