use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard upper bound the remote API places on a single list page.
pub const MAX_PAGE_SIZE: u32 = 50;
/// Hard upper bound on commands in one remote batch call.
pub const MAX_BATCH_SIZE: u32 = 50;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bitrix: BitrixConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct BitrixConfig {
    /// Inbound webhook base URL; it embeds the access token.
    pub webhook_url: SecretString,
    pub timeout_secs: u64,
    pub page_size: u32,
    pub batch_size: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub webhook_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub page_size: Option<u32>,
    pub batch_size: Option<u32>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for BitrixConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new().into(),
            timeout_secs: 30,
            page_size: MAX_PAGE_SIZE,
            batch_size: MAX_BATCH_SIZE,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { bitrix: BitrixConfig::default(), logging: LoggingConfig::default() }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("crmbridge.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(bitrix) = patch.bitrix {
            if let Some(webhook_url) = bitrix.webhook_url {
                self.bitrix.webhook_url = webhook_url.into();
            }
            if let Some(timeout_secs) = bitrix.timeout_secs {
                self.bitrix.timeout_secs = timeout_secs;
            }
            if let Some(page_size) = bitrix.page_size {
                self.bitrix.page_size = page_size;
            }
            if let Some(batch_size) = bitrix.batch_size {
                self.bitrix.batch_size = batch_size;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let webhook_url =
            read_env("CRMBRIDGE_BITRIX_WEBHOOK_URL").or_else(|| read_env("BITRIX_WEBHOOK_URL"));
        if let Some(value) = webhook_url {
            self.bitrix.webhook_url = value.into();
        }
        if let Some(value) = read_env("CRMBRIDGE_BITRIX_TIMEOUT_SECS") {
            self.bitrix.timeout_secs = parse_u64("CRMBRIDGE_BITRIX_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CRMBRIDGE_BITRIX_PAGE_SIZE") {
            self.bitrix.page_size = parse_u32("CRMBRIDGE_BITRIX_PAGE_SIZE", &value)?;
        }
        if let Some(value) = read_env("CRMBRIDGE_BITRIX_BATCH_SIZE") {
            self.bitrix.batch_size = parse_u32("CRMBRIDGE_BITRIX_BATCH_SIZE", &value)?;
        }

        let log_level = read_env("CRMBRIDGE_LOGGING_LEVEL")
            .or_else(|| read_env("CRMBRIDGE_LOG_LEVEL"))
            .or_else(|| read_env("LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CRMBRIDGE_LOGGING_FORMAT").or_else(|| read_env("CRMBRIDGE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(webhook_url) = overrides.webhook_url {
            self.bitrix.webhook_url = webhook_url.into();
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.bitrix.timeout_secs = timeout_secs;
        }
        if let Some(page_size) = overrides.page_size {
            self.bitrix.page_size = page_size;
        }
        if let Some(batch_size) = overrides.batch_size {
            self.bitrix.batch_size = batch_size;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bitrix(&self.bitrix)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("crmbridge.toml"), PathBuf::from("config/crmbridge.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_bitrix(bitrix: &BitrixConfig) -> Result<(), ConfigError> {
    let url = bitrix.webhook_url.expose_secret().trim();
    if url.is_empty() {
        return Err(ConfigError::Validation(
            "bitrix.webhook_url is required. Create an inbound webhook in the portal under \
             Developer resources > Other > Inbound webhook"
                .to_string(),
        ));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "bitrix.webhook_url must start with http:// or https://".to_string(),
        ));
    }

    if bitrix.timeout_secs == 0 || bitrix.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "bitrix.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if bitrix.page_size == 0 || bitrix.page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::Validation(format!(
            "bitrix.page_size must be in range 1..={MAX_PAGE_SIZE}"
        )));
    }

    if bitrix.batch_size == 0 || bitrix.batch_size > MAX_BATCH_SIZE {
        return Err(ConfigError::Validation(format!(
            "bitrix.batch_size must be in range 1..={MAX_BATCH_SIZE}"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    bitrix: Option<BitrixPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BitrixPatch {
    webhook_url: Option<String>,
    timeout_secs: Option<u64>,
    page_size: Option<u32>,
    batch_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
