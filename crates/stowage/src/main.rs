use std::path::PathBuf;

use clap::Parser;
use lloggs::LoggingArgs;
use tracing::info;

use stowage::{Config, bootstrap_all};

#[derive(Parser)]
#[command(name = "stowage")]
#[command(about = "Reconcile tenant file catalogs with their storage trees")]
struct Args {
    /// Tenant configuration file (YAML)
    #[arg(long, short, default_value = "config/app_config.yaml")]
    config: PathBuf,

    #[command(flatten)]
    logging: LoggingArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let _guard = args.logging.setup(|v| match v {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    })?;

    let config = Config::load(&args.config)?;
    info!(config = ?args.config, tenants = config.applications.len(), "Loaded configuration");

    for (tenant, report) in bootstrap_all(&config).await? {
        info!(
            tenant = %tenant,
            inserted = report.inserted,
            deleted = report.deleted,
            "Tenant ready"
        );
    }

    Ok(())
}
