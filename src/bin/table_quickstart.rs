//! table-quickstart - fetch one entity and print one of its properties

use clap::Parser;
use storage_quickstart::cli::{init_logging, TableCli};
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = TableCli::parse();
    let config = cli.load_config().await;
    init_logging(cli.debug_enabled(config.as_ref().ok()), cli.json_logs);

    let result = match config {
        Ok(config) => cli.execute(config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("Error: {}", e);
        println!("{}", e);
        std::process::exit(1);
    }
}
