//! Process-wide tracing setup for binaries embedding the pipeline.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to install log bridge: {0}")]
    Bridge(String),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingOptions {
    /// 0 = info, 1 = debug, 2 or more = trace. `RUST_LOG` takes precedence.
    pub verbosity: u8,
    /// One JSON object per line instead of human-readable output.
    pub json: bool,
}

pub fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber and routes `log` records into it.
///
/// Fails if a global logger or subscriber is already set.
pub fn init(options: &LoggingOptions) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(options.verbosity)));

    let json_layer = options.json.then(|| fmt::layer().json().with_target(true));
    let text_layer = (!options.json).then(|| fmt::layer().with_target(false));

    let subscriber = Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer);

    tracing_log::LogTracer::init().map_err(|e| LoggingError::Bridge(e.to_string()))?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| LoggingError::Subscriber(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        assert_eq!(default_level(0), "info");
        assert_eq!(default_level(1), "debug");
        assert_eq!(default_level(5), "trace");
    }

    #[test]
    fn test_second_init_fails() {
        let options = LoggingOptions {
            verbosity: 1,
            json: true,
        };
        let _ = init(&options);
        assert!(init(&options).is_err());
    }
}
