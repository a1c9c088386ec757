use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Installs the global fmt subscriber. `RUST_LOG` wins over the configured
/// level when set. Returns `false` if a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let level = parse_level(&config.level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    match installed {
        Ok(()) => {
            tracing::info!(
                event_name = "system.logging.initialized",
                level = %level,
                format = ?config.format,
                "logging initialized"
            );
            true
        }
        Err(_) => false,
    }
}

fn parse_level(raw: &str) -> Level {
    raw.trim().parse::<Level>().unwrap_or(Level::INFO)
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::{init_logging, parse_level};
    use crate::config::LoggingConfig;

    #[test]
    fn unknown_level_falls_back_to_info() {
        assert_eq!(parse_level("verbose"), Level::INFO);
        assert_eq!(parse_level(" debug "), Level::DEBUG);
    }

    #[test]
    fn second_initialisation_is_a_no_op() {
        let config = LoggingConfig::default();
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}
