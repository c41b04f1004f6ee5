mod app;
mod input;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use mythipet::config::{load_settings, project_paths};

#[tokio::main]
async fn main() -> Result<()> {
    let paths = project_paths()?;
    let settings = load_settings(&paths.settings_path);

    // stdout is the game's console, logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    app::run(paths, settings).await
}
