//! blob-quickstart - create a container, upload, list, download and delete a sample blob

use clap::Parser;
use storage_quickstart::cli::{init_logging, BlobCli};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = BlobCli::parse();
    let config = cli.load_config().await;
    init_logging(cli.debug_enabled(config.as_ref().ok()), cli.json_logs);

    let result = match config {
        Ok(config) => cli.execute(config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(report) => info!(container = %report.container_name, blob = %report.blob_name, "quickstart finished"),
        Err(e) => {
            error!("Error: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
