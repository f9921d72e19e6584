pub mod client;
pub mod error;
pub mod fixtures;
pub mod poller;
pub mod score;
pub mod transform;
pub mod types;
pub mod validate;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::client::{HttpSource, ScoreSource};
use crate::fixtures::FixtureSource;
use crate::poller::PollController;
use crate::types::config::WatchConfig;

/// Initialize structured logging with tracing.
/// Respects RUST_LOG env var; defaults to `info` level for heatwatch crate.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("heatwatch=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Run the poller as a foreground daemon until ctrl-c.
pub async fn run() -> Result<(), String> {
    init_tracing();
    dotenvy::dotenv().ok();

    let config = WatchConfig::from_env()?;
    info!(
        assets = config.assets.len(),
        refresh_ms = config.refresh_ms,
        fixtures = config.use_fixtures,
        "starting"
    );

    let source: Arc<dyn ScoreSource> = if config.use_fixtures {
        Arc::new(FixtureSource)
    } else {
        Arc::new(HttpSource::new(config.base_url.clone()))
    };

    let controller = PollController::new(source, config.assets.clone(), config.max_retries);
    let mut updates = controller.subscribe();

    controller.start(Duration::from_millis(config.refresh_ms)).await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                info!(
                    assets = snapshot.data.len(),
                    loading = snapshot.loading,
                    error = snapshot.error.as_deref(),
                    "state updated"
                );
            }
        }
    }

    controller.stop();
    Ok(())
}
