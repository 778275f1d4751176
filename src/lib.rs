pub mod config;
pub mod persistence;
pub mod server;

use std::sync::Arc;

use config::Config;
use hub::Hub;
use persistence::MemoryPersistence;

/// Builds the Hub and runs the accept loop until shutdown. Exposed so
/// integration tests can drive the same startup path the binary uses.
pub async fn server_main(config: Arc<Config>) -> anyhow::Result<()> {
    let hub = Hub::new(MemoryPersistence::new(), config.server.hub_options());
    server::run(config, hub).await
}
