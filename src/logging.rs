use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use color_eyre::Result;
use color_eyre::eyre::Context;
use tracing_subscriber::fmt::format::{Compact, DefaultFields, Format};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// One line per event, without timestamps or targets.
fn console_layer<S>() -> fmt::Layer<S, DefaultFields, Format<Compact, ()>> {
    fmt::layer().compact().with_target(false).without_time()
}

/// Console output filtered by `tracing_level` (overridden by `RUST_LOG`), plus a
/// plain-text copy in `log_file` when given.
pub fn init_tracing(tracing_level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter_layer = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(tracing_level),
    }
    .wrap_err("Failed to create tracing filter")?;

    let fmt_layer = console_layer();

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(file_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::Registry;

    #[test]
    fn test_console_layer_is_compact() {
        let _layer: fmt::Layer<Registry, DefaultFields, Format<Compact, ()>> = console_layer();
    }
}
