//! Logging utilities for the Huddle application.
//!
//! Every binary calls [`init`] once at startup. Library crates only use the
//! `tracing` macros.

use huddle_config::LoggingConfig;
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber from the logging configuration.
///
/// The configured level applies to the `huddle*` targets; `RUST_LOG`
/// directives are honoured on top of it. When `log_dir` is set, a daily
/// rolling file layer is added and its flush guard is returned. The guard
/// must be kept alive for the lifetime of the process.
///
/// # Examples
///
/// ```
/// use huddle_common::logging;
/// use huddle_config::LoggingConfig;
///
/// let _guard = logging::init(&LoggingConfig::default());
/// ```
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);

    let (file_layer, guard) = match config.log_dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "huddle.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // Use try_init to handle the case where a global default subscriber has already been set
    let result = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true),
        )
        .with(file_layer)
        .with(env_filter(level))
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
    guard
}

/// Initialize the tracing subscriber with a specific log level and no file output.
pub fn init_with_level(level: Level) {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_line_number(true))
        .with(env_filter(level))
        .try_init();
}

fn env_filter(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();
    for target in ["huddle", "tower_http"] {
        if let Ok(directive) = format!("{target}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}
