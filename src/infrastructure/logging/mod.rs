//! Logging initialization.
//!
//! Env-filtered tracing-subscriber with pretty or JSON output and an
//! optional daily-rolled file under the state directory. The returned
//! guard must stay alive for the file writer to flush.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::domain::models::config::Config;

/// Keeps the non-blocking file writer alive.
pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Install the global subscriber from config. `RUST_LOG` overrides the
/// configured level.
pub fn init(config: &Config) -> LogGuard {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    let mut file_guard = None;
    let file_layer = if config.logging.file_logging {
        let appender = tracing_appender::rolling::daily(
            format!("{}/logs", config.paths.state_dir),
            "harrow.log",
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);
        Some(fmt::layer().with_writer(writer).with_ansi(false))
    } else {
        None
    };

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(fmt::layer().compact())
            .init();
    }

    LogGuard {
        _file_guard: file_guard,
    }
}
