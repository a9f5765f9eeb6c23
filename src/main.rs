use clap::Parser;
use kprop::cli::{self, Cli};
use kprop::PredictionService;
use tracing::{error, warn};

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_logging_simple();
            error!("{e:#}");
            return Err(e);
        }
    };
    init_logging(&config.logging, cli.log_dir.as_deref());

    let service = PredictionService::from_config(config)?;
    let failed = service.warm_up().await;
    if !failed.is_empty() {
        warn!(models = ?failed, "some configured models failed to load");
    }

    cli::run(cli.command, &service, cli.output).await
}
