use anyhow::Context;
use aquaria_ingest::clients::{http_client, OverpassClient};
use aquaria_ingest::config::{Config, StoreBackendKind};
use aquaria_ingest::domain::ingest::ingest_features;
use aquaria_ingest::domain::models::Target;
use aquaria_ingest::storage::memory::InMemoryBackend;
use aquaria_ingest::storage::mongo::MongoBackend;
use aquaria_ingest::storage::{StoreBackend, StoreConnector};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aquaria_ingest=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!("Store backend: {:?}", config.store_backend);
    info!("Geospatial endpoint: {}", config.overpass_url);

    // Initialize storage
    let backend: Arc<dyn StoreBackend> = match config.store_backend {
        StoreBackendKind::Mongo => Arc::new(MongoBackend::new(
            config.mongo_uri()?,
            config.mongo_app_name.clone(),
            config.store_timeout,
        )),
        StoreBackendKind::Memory => {
            let memory = InMemoryBackend::new();
            if let (Some(database), Some(collection)) = (&config.mongo_database, &config.mongo_collection) {
                memory.create_collection(database, collection)?;
            }
            Arc::new(memory)
        }
    };
    let store = StoreConnector::with_target(
        backend,
        Target {
            database: config.mongo_database.clone(),
            collection: config.mongo_collection.clone(),
        },
    );

    // Initialize clients
    let client = http_client(&config.user_agent, config.http_timeout)?;
    let overpass = OverpassClient::new(client, config.overpass_url.clone());

    let report = ingest_features(&overpass, &store, &config.overpass_query)
        .await
        .context("feature ingest failed")?;
    info!(
        "Ingest finished: fetched={} inserted={} invalid_target={}",
        report.fetched, report.inserted, report.skipped_invalid_target
    );

    Ok(())
}
