use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use scanlens::config::{self, AppConfig};
use scanlens::inference;
use scanlens::pipeline::ReportPipeline;
use scanlens::server::{self, AppState};
use scanlens::volume::loader::VolumeLoader;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Scanlens starting v{}", config::APP_VERSION);

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    // The volume is built exactly once; a directory that cannot be
    // reconstructed leaves nothing meaningful to serve.
    let volume = match VolumeLoader::load_from_directory(&config.scan_dir) {
        Ok(volume) => volume,
        Err(e) => {
            tracing::error!(dir = %config.scan_dir.display(), "Cannot build volume: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        dims = ?volume.dim(),
        spacing = ?volume.spacing(),
        "Volume loaded"
    );

    // reqwest's blocking client must not be constructed on the async runtime.
    let client = {
        let config = config.clone();
        match tokio::task::spawn_blocking(move || inference::build_client(&config)).await {
            Ok(client) => client,
            Err(e) => {
                tracing::error!("Failed to construct inference client: {e}");
                std::process::exit(1);
            }
        }
    };

    let pipeline = ReportPipeline::new(config.scan_dir.clone(), config.failure_policy, client);
    let state = Arc::new(AppState::new(volume, pipeline));

    if let Err(e) = server::run_server(state, config.bind_addr).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}
