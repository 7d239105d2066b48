use super::env_helpers::{
    load_env_bool, load_env_list, load_env_path_opt, load_env_string, load_env_string_opt,
    load_env_var,
};
use super::{
    ConfigError, DEFAULT_LOG_GROUP, DEFAULT_MAX_BATCH_SIZE, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_REGION, LogLevel,
};
use clap::Parser;
use clap::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Region of the log service (falls back to AWS_DEFAULT_REGION, then us-east-1)
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Create the log group before the stream
    #[arg(long, env = "CREATE_LOG_GROUP")]
    pub create_log_group: bool,

    /// Log group name
    #[arg(long, env = "LOG_GROUP_NAME", default_value = DEFAULT_LOG_GROUP)]
    pub log_group_name: String,

    /// Log stream name (default: "<UTC timestamp> <hostname>")
    #[arg(long, env = "LOG_STREAM_NAME")]
    pub log_stream_name: Option<String>,

    /// Maximum number of records per submission
    #[arg(long, env = "MAX_BATCH_SIZE", default_value_t = DEFAULT_MAX_BATCH_SIZE)]
    pub max_batch_size: usize,

    /// Longest wait between two submission attempts, in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Override of the regional service endpoint
    #[arg(long, env = "LOGS_ENDPOINT")]
    pub endpoint: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Logger name stamped on records read from stdin
    #[arg(long, env = "LOGGER_NAME", default_value = "stdin")]
    pub logger_name: String,

    /// Level of the shipper's own diagnostics
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Extra `target=level` filter for the shipper's diagnostics (repeatable)
    #[arg(long = "log-directive", env = "LOG_DIRECTIVES", value_delimiter = ',')]
    pub log_directives: Vec<String>,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Derived fields (not CLI arguments)
    #[serde(skip)]
    #[arg(skip)]
    pub poll_interval: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: None,
            create_log_group: false,
            log_group_name: DEFAULT_LOG_GROUP.to_string(),
            log_stream_name: None,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            endpoint: None,
            request_timeout_secs: 30,
            logger_name: "stdin".to_string(),
            log_level: LogLevel::Info,
            log_directives: Vec::new(),
            config_file: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Self::parse_command_line(args)?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        load_env_string_opt("AWS_REGION", &mut config.region);
        load_env_bool("CREATE_LOG_GROUP", &mut config.create_log_group)?;
        load_env_string("LOG_GROUP_NAME", &mut config.log_group_name);
        load_env_string_opt("LOG_STREAM_NAME", &mut config.log_stream_name);
        load_env_var("MAX_BATCH_SIZE", &mut config.max_batch_size)?;
        load_env_var("POLL_INTERVAL_MS", &mut config.poll_interval_ms)?;
        load_env_string_opt("LOGS_ENDPOINT", &mut config.endpoint);
        load_env_var("REQUEST_TIMEOUT_SECS", &mut config.request_timeout_secs)?;
        load_env_string("LOGGER_NAME", &mut config.logger_name);
        load_env_var("LOG_LEVEL", &mut config.log_level)?;
        load_env_list("LOG_DIRECTIVES", &mut config.log_directives);
        load_env_path_opt("CONFIG_FILE", &mut config.config_file);

        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    /// CLI arguments (with their env fallbacks) layered over the file named by
    /// `--config-file`, when one is given. Values left at their defaults on
    /// the command line do not override the file.
    pub fn from_args_and_env<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Self::parse_command_line(args)?;

        if let Some(path) = config.config_file.clone() {
            let base = Self::load_file(&path)?;
            config.merge_over(base);
        }

        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    /// Help and version output come back as [`ConfigError::DisplayRequested`]
    /// for the caller to print.
    fn parse_command_line<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Config::try_parse_from(args).map_err(|e| match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                ConfigError::DisplayRequested(e.to_string())
            }
            _ => ConfigError::InvalidConfig(e.to_string()),
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(path.as_ref())?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Fills every field still at its default from `base`.
    fn merge_over(&mut self, base: Config) {
        let defaults = Config::default();

        if self.region.is_none() {
            self.region = base.region;
        }
        if !self.create_log_group {
            self.create_log_group = base.create_log_group;
        }
        if self.log_group_name == defaults.log_group_name {
            self.log_group_name = base.log_group_name;
        }
        if self.log_stream_name.is_none() {
            self.log_stream_name = base.log_stream_name;
        }
        if self.max_batch_size == defaults.max_batch_size {
            self.max_batch_size = base.max_batch_size;
        }
        if self.poll_interval_ms == defaults.poll_interval_ms {
            self.poll_interval_ms = base.poll_interval_ms;
        }
        if self.endpoint.is_none() {
            self.endpoint = base.endpoint;
        }
        if self.request_timeout_secs == defaults.request_timeout_secs {
            self.request_timeout_secs = base.request_timeout_secs;
        }
        if self.logger_name == defaults.logger_name {
            self.logger_name = base.logger_name;
        }
        if self.log_level == defaults.log_level {
            self.log_level = base.log_level;
        }
        if self.log_directives.is_empty() {
            self.log_directives = base.log_directives;
        }
    }

    pub fn post_process(&mut self) -> Result<(), ConfigError> {
        if self.region.is_none() {
            load_env_string_opt("AWS_DEFAULT_REGION", &mut self.region);
        }

        self.poll_interval = Duration::from_millis(self.poll_interval_ms);
        self.request_timeout = Duration::from_secs(self.request_timeout_secs);
        Ok(())
    }

    /// The configured region, or [`DEFAULT_REGION`].
    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }
}
