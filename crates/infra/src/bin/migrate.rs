//! Apply the sales schema to the configured database.

use salesflow_infra::{EngineConfig, PostgresSalesStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EngineConfig::load()?;
    salesflow_observability::init_with(&config.logging.filter, config.logging.json);

    PostgresSalesStore::connect(&config.database).await?;
    tracing::info!(max_connections = config.database.max_connections, "sales database ready");
    Ok(())
}
