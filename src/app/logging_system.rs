use super::config::LogLevel;
use super::initialization::{InitializationError, LogDirective};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Targets kept at `warn` regardless of the configured level. The HTTP stack
/// is chatty at debug and would drown the shipper's own diagnostics.
const QUIET_TARGETS: [&str; 4] = ["hyper", "hyper_util", "reqwest", "h2"];

/// Builds the `EnvFilter` for the shipper's diagnostics and installs the
/// global subscriber.
pub struct LoggingSystem {
    directives: Vec<LogDirective>,
    fallback_level: LogLevel,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: Vec::new(),
            fallback_level: LogLevel::Info,
        }
    }

    /// Adds a `target=level` directive, replacing any earlier one for the same
    /// target. An unknown level falls back to the default level; a malformed
    /// directive is rejected.
    pub fn add_directive(&mut self, directive_str: &str) -> Result<(), InitializationError> {
        let directive = match LogDirective::parse(directive_str) {
            Ok(directive) => directive,
            Err(InitializationError::InvalidLogLevel { target, input }) => {
                eprintln!("Warning: invalid log level '{input}' for {target}, using default level");
                LogDirective::new(target, self.fallback_level)
            }
            Err(e) => return Err(e),
        };

        self.directives.retain(|d| d.target != directive.target);
        self.directives.push(directive);
        Ok(())
    }

    pub fn add_default_directives(&mut self) {
        for target in QUIET_TARGETS {
            self.directives.push(LogDirective::new(target, LogLevel::Warn));
        }
    }

    /// Diagnostics go to stderr so stdout stays free for whatever feeds the
    /// shipper.
    pub fn initialize_tracing(&self, default_level: LogLevel) -> Result<(), InitializationError> {
        let filter_string = self.build_filter_string(default_level);

        let env_filter = EnvFilter::try_new(&filter_string).map_err(|e| {
            InitializationError::LoggingInitFailed {
                details: format!("Failed to create EnvFilter with '{filter_string}'"),
                source: Box::new(e),
            }
        })?;

        let subscriber = tracing_subscriber::registry().with(env_filter).with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true)
                .with_level(true)
                .compact(),
        );

        tracing::subscriber::set_global_default(subscriber).map_err(|e| {
            InitializationError::LoggingInitFailed {
                details: "Failed to set global tracing subscriber".to_string(),
                source: Box::new(e),
            }
        })
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let mut filter_parts = Vec::with_capacity(self.directives.len() + 1);
        filter_parts.push(default_level.as_str().to_string());
        filter_parts.extend(self.directives.iter().map(LogDirective::to_filter_string));

        filter_parts.join(",")
    }

    pub fn directive_count(&self) -> usize {
        self.directives.len()
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the global subscriber once per process. `directives` are applied
/// after the built-in ones, so they can override them; malformed entries are
/// reported and skipped. Later calls report whether the first one succeeded.
pub fn setup_logging_safe(
    level: LogLevel,
    directives: &[String],
) -> Result<(), InitializationError> {
    use std::sync::OnceLock;

    static INIT: OnceLock<Result<(), String>> = OnceLock::new();

    let outcome = INIT.get_or_init(|| {
        let mut logging_system = LoggingSystem::new();
        logging_system.add_default_directives();
        for directive in directives {
            if let Err(e) = logging_system.add_directive(directive) {
                eprintln!("Warning: {e}, skipping directive");
            }
        }
        logging_system
            .initialize_tracing(level)
            .map_err(|e| e.to_string())
    });

    outcome
        .clone()
        .map_err(|details| InitializationError::LoggingInitFailed {
            details,
            source: Box::new(std::io::Error::other("Logging initialization error")),
        })
}
