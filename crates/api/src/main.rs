//! Pet Disease Classifier - Main Entry Point

use anyhow::bail;
use api::{init_logging, run_server, AppConfig};
use std::path::PathBuf;
use tracing::info;

/// Config file from `--config <path>`, falling back to `PETVISION_CONFIG`
fn config_path() -> anyhow::Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(path) => return Ok(Some(PathBuf::from(path))),
                None => bail!("--config requires a path"),
            },
            other => {
                if let Some(path) = other.strip_prefix("--config=") {
                    return Ok(Some(PathBuf::from(path)));
                }
                bail!("Unknown argument: {}", other);
            }
        }
    }
    Ok(std::env::var_os("PETVISION_CONFIG").map(PathBuf::from))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config_path()?;
    let config = AppConfig::load(path.as_deref())?;
    init_logging(&config.logging)?;

    info!("=== Pet Disease Classifier v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Model {}, labels {}, top_k {}",
        config.classifier.model_path.display(),
        config.classifier.labels_path.display(),
        config.classifier.top_k
    );

    run_server(config).await
}
