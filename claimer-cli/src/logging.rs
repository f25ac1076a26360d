use anyhow::Result;
use std::env;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn log_level() -> Level {
    env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO)
}

fn filter(level: Level) -> EnvFilter {
    EnvFilter::from_default_env()
        .add_directive(level.into())
        // DevTools socket and HTTP client chatter
        .add_directive("tungstenite=warn".parse().expect("static directive"))
        .add_directive("tokio_tungstenite=warn".parse().expect("static directive"))
        .add_directive("hyper=warn".parse().expect("static directive"))
        .add_directive("reqwest=warn".parse().expect("static directive"))
}

/// Logs to stderr and to a daily file in `log_dir`. Keep the returned guard
/// alive until exit so buffered file output is flushed.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    let level = log_level();

    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Failed to create log directory {}: {e}", log_dir.display());
    }
    let file_appender = tracing_appender::rolling::daily(log_dir, "claimer.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter(level)),
        )
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter(level)),
        )
        .try_init()?;

    Ok(guard)
}
