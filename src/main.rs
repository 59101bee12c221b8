use anyhow::Result;
use tracing::{error, info};

use site_indexer::cli;
use site_indexer::utils::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::parse_args();

    logging::init_logging(args.verbose, args.log_file.clone())?;

    info!("Starting site indexer v{}", env!("CARGO_PKG_VERSION"));

    match cli::process_command(args).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {}", e);
            Err(e)
        }
    }
}
