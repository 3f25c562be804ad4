use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const DEFAULT_LOG_LEVEL: &str = "info,warehouse_backend=debug,warehouse_database=debug,\
                                     tokio_postgres=info,hyper=info,tower=info,tower_http=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into())
}

/// Installs the global subscriber. `RUST_LOG` overrides [`DEFAULT_LOG_LEVEL`].
///
/// Does nothing if a subscriber is already installed, so tests and binaries
/// can both call it.
pub fn setup_telemetry() {
    let stdout_log = tracing_subscriber::fmt::layer();

    if tracing_subscriber::registry()
        .with(stdout_log.with_filter(env_filter()))
        .try_init()
        .is_ok()
    {
        info!("telemetry initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_parses() {
        assert!(DEFAULT_LOG_LEVEL.parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn setup_is_repeatable() {
        setup_telemetry();
        setup_telemetry();
    }
}
