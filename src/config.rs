//! Engine configuration.
//!
//! Configuration is assembled in layers: built-in defaults, then an optional
//! TOML or JSON file, then environment variables. The result is validated
//! before it is handed out.

use crate::error::{PipelineError, PipelineResult};
use log::{debug, LevelFilter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default prefix for environment overrides.
pub const DEFAULT_ENV_PREFIX: &str = "STREAMSCRIPT";

/// Configuration for compiling and running pipelines.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Compilation and evaluation settings
    pub execution: ExecutionConfig,
    /// Logging settings for the binary
    pub logging: LoggingConfig,
    /// How results are written
    pub output: OutputConfig,
}

/// Compilation and evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Evaluate constant sub-pipelines once at compile time
    pub fold_constants: bool,
    /// Fail when an input source goes back in time
    pub validate_order: bool,
    /// Maximum number of input sources merged into one stream
    pub max_sources: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            fold_constants: true,
            validate_order: true,
            max_sources: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}

impl FromStr for LogLevel {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(PipelineError::configuration(format!(
                "unknown log level '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Pretty-print JSON array output
    pub pretty: bool,
}

/// Layout of written datapoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// A single JSON array
    #[serde(rename = "json")]
    Json,
    /// One JSON object per line
    #[default]
    #[serde(rename = "jsonl")]
    JsonLines,
}

impl FromStr for OutputFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "jsonl" => Ok(OutputFormat::JsonLines),
            other => Err(PipelineError::configuration(format!(
                "unknown output format '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonLines => write!(f, "jsonl"),
        }
    }
}

impl EngineConfig {
    /// Checks value ranges.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.execution.max_sources == 0 {
            return Err(PipelineError::configuration(
                "execution.max_sources must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Loads [`EngineConfig`] from files and the environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_PREFIX)
    }
}

impl ConfigLoader {
    pub fn new(env_prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: env_prefix.into(),
        }
    }

    /// Loads defaults, the optional file, and environment overrides, then
    /// validates the result.
    pub fn load(&self, path: Option<&Path>) -> PipelineResult<EngineConfig> {
        let mut config = match path {
            Some(path) => Self::load_file(path)?,
            None => EngineConfig::default(),
        };
        self.apply_env(&mut config)?;
        config.validate()?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Reads a configuration file. The format follows the file extension.
    pub fn load_file(path: &Path) -> PipelineResult<EngineConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                PipelineError::configuration(format!("Failed to parse JSON config: {}", e))
            }),
            _ => Err(PipelineError::configuration(
                "Unsupported config file format (only JSON and TOML supported)",
            )),
        }
    }

    /// Applies `<PREFIX>_*` environment variables on top of `config`.
    pub fn apply_env(&self, config: &mut EngineConfig) -> PipelineResult<()> {
        self.override_from_env("FOLD_CONSTANTS", &mut config.execution.fold_constants)?;
        self.override_from_env("VALIDATE_ORDER", &mut config.execution.validate_order)?;
        self.override_from_env("MAX_SOURCES", &mut config.execution.max_sources)?;
        self.override_from_env("LOG_LEVEL", &mut config.logging.level)?;
        self.override_from_env("OUTPUT_FORMAT", &mut config.output.format)?;
        Ok(())
    }

    fn override_from_env<T>(&self, key: &str, target: &mut T) -> PipelineResult<()>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let name = format!("{}_{}", self.env_prefix, key);
        if let Ok(raw) = std::env::var(&name) {
            *target = raw.trim().parse().map_err(|e| {
                PipelineError::configuration(format!("Invalid value for {}: {}", name, e))
            })?;
        }
        Ok(())
    }
}
