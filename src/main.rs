use anyhow::Context;
use tracing::error;
use tracing_subscriber::EnvFilter;
use zoonotic_loader::{Database, Pipeline, PipelineConfig, SqliteConfig};

fn main() {
    init_tracing();
    if let Err(err) = run() {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let database = Database::new(SqliteConfig::default()).context("preparing database directory")?;
    let config = PipelineConfig::default();
    let csv_path = config.csv_path.clone();
    let report = Pipeline::new(config, &database)
        .run()
        .with_context(|| format!("pipeline run over {} failed", csv_path.display()))?;
    tracing::info!(?report, "pipeline finished");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
