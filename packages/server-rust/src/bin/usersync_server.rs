use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use usersync_server::config::ServerArgs;
use usersync_server::logging::init_logging;
use usersync_server::network::NetworkModule;
use usersync_server::{MemoryAssetStore, MemoryDocumentStore, RecordStoreAdapter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    init_logging(args.log_format)?;

    let store = Arc::new(MemoryDocumentStore::new());
    let assets = Arc::new(MemoryAssetStore::new(args.asset_base_url()?));
    let adapter = RecordStoreAdapter::new(store, args.adapter_config()).with_assets(assets.clone());

    let mut module = NetworkModule::new(args.network_config(), Arc::new(adapter), assets);
    let port = module.start().await?;
    info!(port, collection = %args.collection, "usersync-server started");

    module
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("usersync-server stopped");
    Ok(())
}
