//! Configuration system for the `SmartTask` server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/smarttask/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur when loading server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A job interval was configured as zero.
    #[error("{name} must be greater than zero")]
    ZeroInterval {
        /// Name of the offending setting.
        name: &'static str,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerConfigFile {
    server: ServerFileConfig,
    scheduler: SchedulerFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    data_file: Option<PathBuf>,
    allow_origin: Option<String>,
}

/// `[scheduler]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SchedulerFileConfig {
    enabled: Option<bool>,
    due_soon_interval_secs: Option<u64>,
    recurrence_interval_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "SmartTask REST API server")]
pub struct ServerCliArgs {
    /// Address to bind the HTTP server to.
    #[arg(short, long, env = "SMARTTASK_ADDR")]
    pub bind: Option<String>,

    /// Path of the JSON file holding the task collection.
    #[arg(short, long, env = "SMARTTASK_DATA")]
    pub data_file: Option<PathBuf>,

    /// Path to config file (default: `~/.config/smarttask/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Value of the `Access-Control-Allow-Origin` response header.
    #[arg(long)]
    pub allow_origin: Option<String>,

    /// Do not start the background jobs.
    #[arg(long)]
    pub no_scheduler: bool,

    /// Seconds between due-soon scans.
    #[arg(long)]
    pub due_soon_interval_secs: Option<u64>,

    /// Seconds between recurrence regeneration runs.
    #[arg(long)]
    pub recurrence_interval_secs: Option<u64>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "SMARTTASK_LOG")]
    pub log_level: String,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:5000`).
    pub bind_addr: String,
    /// JSON file holding the task collection.
    pub data_file: PathBuf,
    /// Value of the `Access-Control-Allow-Origin` header.
    pub allow_origin: String,
    /// Whether the background jobs run.
    pub scheduler_enabled: bool,
    /// Period of the due-soon scan.
    pub due_soon_interval: Duration,
    /// Period of the recurrence regeneration job.
    pub recurrence_interval: Duration,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            data_file: PathBuf::from("tasks.json"),
            allow_origin: "*".to_string(),
            scheduler_enabled: true,
            due_soon_interval: Duration::from_secs(60 * 60),
            recurrence_interval: Duration::from_secs(24 * 60 * 60),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and missing file
    /// is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, or if a job interval resolves to zero.
    pub fn load(cli: &ServerCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ServerConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &ServerCliArgs, file: &ServerConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let due_soon_secs = cli
            .due_soon_interval_secs
            .or(file.scheduler.due_soon_interval_secs)
            .unwrap_or(defaults.due_soon_interval.as_secs());
        let recurrence_secs = cli
            .recurrence_interval_secs
            .or(file.scheduler.recurrence_interval_secs)
            .unwrap_or(defaults.recurrence_interval.as_secs());
        if due_soon_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                name: "due_soon_interval_secs",
            });
        }
        if recurrence_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                name: "recurrence_interval_secs",
            });
        }

        Ok(Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            data_file: cli
                .data_file
                .clone()
                .or_else(|| file.server.data_file.clone())
                .unwrap_or(defaults.data_file),
            allow_origin: cli
                .allow_origin
                .clone()
                .or_else(|| file.server.allow_origin.clone())
                .unwrap_or(defaults.allow_origin),
            scheduler_enabled: !cli.no_scheduler
                && file.scheduler.enabled.unwrap_or(defaults.scheduler_enabled),
            due_soon_interval: Duration::from_secs(due_soon_secs),
            recurrence_interval: Duration::from_secs(recurrence_secs),
            log_level: cli.log_level.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<ServerConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ServerConfigFile::default());
        };
        config_dir.join("smarttask").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
