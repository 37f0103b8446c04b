//! Logging setup: console plus optional daily-rolling file output.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize logging.
///
/// The console layer writes to stderr so stdout stays free for the event
/// stream. `RUST_LOG` overrides the default level. When `log_dir` is given,
/// an `info` level copy goes to `lumen.log` in that directory, rotated daily.
pub fn setup(verbose: bool, log_dir: Option<&Path>) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let file_layer = log_dir.and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Warning: Failed to create log directory {:?}: {}", dir, e);
            return None;
        }
        let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "lumen.log");
        Some(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(file_appender)
                .with_filter(EnvFilter::new("info")),
        )
    });

    match file_layer {
        Some(file_layer) => {
            tracing_subscriber::registry()
                .with(console_layer)
                .with(file_layer)
                .init();
            tracing::info!("File logging enabled: {:?}", log_dir);
        }
        None => {
            tracing_subscriber::registry().with(console_layer).init();
        }
    }
}
