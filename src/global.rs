//! Process-wide logger
//!
//! The logger is built once, on first use, from the setup supplied to
//! [`configure`] or from the environment. Its sink list never changes
//! afterwards.
//!
//! # Example
//!
//! ```no_run
//! use trace_fanout_logger::{configure, logger, LoggerConfig, LoggerSetup};
//!
//! configure(LoggerSetup::new(LoggerConfig::from_env())).unwrap();
//! logger().info("service started");
//! ```

use crate::appenders::{
    ConsoleAppender, DatabaseAppender, HttpIndexTransport, IndexTransport, RecordReceiver,
    RotatingFileAppender, SearchIndexAppender,
};
use crate::config::LoggerConfig;
use crate::core::{
    ApmAgent, CorrelationResolver, FormatPipeline, Logger, LoggerError, LoggerMetrics, Result,
    SinkRegistration,
};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};

/// Everything needed to build a logger: configuration plus the external
/// collaborators that cannot come from a config file
pub struct LoggerSetup {
    config: LoggerConfig,
    apm: Option<Arc<dyn ApmAgent>>,
    receiver: Option<Arc<dyn RecordReceiver>>,
    index_transport: Option<Box<dyn IndexTransport>>,
}

impl LoggerSetup {
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            config,
            apm: None,
            receiver: None,
            index_transport: None,
        }
    }

    #[must_use]
    pub fn with_apm(mut self, agent: Arc<dyn ApmAgent>) -> Self {
        self.apm = Some(agent);
        self
    }

    /// Receiver used by the database sink when it is enabled
    #[must_use]
    pub fn with_receiver(mut self, receiver: Arc<dyn RecordReceiver>) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Replace the HTTP client used by the search index sink
    #[must_use]
    pub fn with_index_transport(mut self, transport: Box<dyn IndexTransport>) -> Self {
        self.index_transport = Some(transport);
        self
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Build a logger, skipping sinks that cannot be created.
    ///
    /// Skipped sinks are reported on stderr. The console sink cannot fail, so
    /// the result always has at least one sink.
    pub fn build(self) -> Logger {
        if let Err(e) = self.config.validate() {
            eprintln!("[LOGGER WARNING] {}", e);
        }
        self.assemble(false).unwrap_or_else(|e| {
            // Unreachable in lenient mode; keep the console as the floor anyway
            eprintln!("[LOGGER ERROR] Logger construction failed: {}", e);
            Logger::builder()
                .sink(ConsoleAppender::new(), Default::default(), FormatPipeline::cli())
                .build()
        })
    }

    /// Build a logger, failing on the first sink that cannot be created
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid configuration, an unwritable log
    /// directory, an enabled database sink without a receiver, or a worker
    /// that cannot start.
    pub fn try_build(self) -> Result<Logger> {
        self.config.validate()?;
        self.assemble(true)
    }

    fn assemble(self, strict: bool) -> Result<Logger> {
        let LoggerSetup {
            config,
            apm,
            receiver,
            index_transport,
        } = self;

        let metrics = Arc::new(LoggerMetrics::new());
        let timestamp = config.timestamp();
        let mut builder = Logger::builder()
            .apm_opt(apm.clone())
            .metrics(Arc::clone(&metrics));

        let mut add = |result: Result<SinkRegistration>, sink: &str| -> Result<()> {
            match result {
                Ok(registration) => {
                    builder = std::mem::take(&mut builder).registration(registration);
                    Ok(())
                }
                Err(e) if strict => Err(e),
                Err(e) => {
                    eprintln!("[LOGGER ERROR] Skipping sink '{}': {}", sink, e);
                    Ok(())
                }
            }
        };

        add(
            RotatingFileAppender::with_policy(config.file.path(), config.file.rotation_policy())
                .map(|appender| {
                    SinkRegistration::new(
                        appender,
                        config.file.level.clone(),
                        FormatPipeline::file().with_timestamp_format(timestamp.clone()),
                    )
                }),
            "file",
        )?;

        add(
            Ok(SinkRegistration::new(
                ConsoleAppender::new(),
                config.console.level.clone(),
                FormatPipeline::cli()
                    .with_colors(config.console.colors)
                    .with_timestamp_format(timestamp.clone()),
            )),
            "console",
        )?;

        if config.search_index.enabled {
            let section = &config.search_index;
            let transport: Result<Box<dyn IndexTransport>> = match index_transport {
                Some(transport) => Ok(transport),
                None => HttpIndexTransport::new(section.endpoint.clone()).map(|transport| {
                    let transport = match (&section.username, &section.password) {
                        (Some(username), password) => transport
                            .with_basic_auth(username.clone(), password.clone().unwrap_or_default()),
                        (None, _) => transport,
                    };
                    Box::new(transport) as Box<dyn IndexTransport>
                }),
            };
            let resolver = match &apm {
                Some(agent) => CorrelationResolver::new(Arc::clone(agent)),
                None => CorrelationResolver::disabled(),
            };

            add(
                transport
                    .and_then(|transport| {
                        SearchIndexAppender::spawn(
                            transport,
                            section.index_prefix.clone(),
                            section.worker_config(),
                            Arc::clone(&metrics),
                        )
                    })
                    .map(|appender| {
                        SinkRegistration::new(
                            appender.with_resolver(resolver),
                            section.level.clone(),
                            FormatPipeline::json().with_timestamp_format(timestamp.clone()),
                        )
                    }),
                "search_index",
            )?;
        }

        if config.database.enabled {
            let section = &config.database;
            add(
                receiver
                    .ok_or_else(|| {
                        LoggerError::config("database", "enabled but no receiver was supplied")
                    })
                    .and_then(|receiver| {
                        DatabaseAppender::spawn(receiver, section.worker_config(), Arc::clone(&metrics))
                    })
                    .map(|appender| {
                        SinkRegistration::new(
                            appender,
                            section.level.clone(),
                            FormatPipeline::json().with_timestamp_format(timestamp.clone()),
                        )
                    }),
                "database",
            )?;
        }

        Ok(builder.build())
    }
}

impl Logger {
    /// Build a logger from configuration alone, skipping sinks that fail
    pub fn from_config(config: &LoggerConfig) -> Logger {
        LoggerSetup::new(config.clone()).build()
    }

    /// Build a logger from configuration alone
    ///
    /// # Errors
    ///
    /// See [`LoggerSetup::try_build`]
    pub fn try_from_config(config: &LoggerConfig) -> Result<Logger> {
        LoggerSetup::new(config.clone()).try_build()
    }
}

/// Lazily built, write-once logger slot
///
/// Every `get` returns the same instance. A setup may be supplied with
/// `configure` until the first `get`.
pub struct LoggerCell {
    logger: OnceLock<Logger>,
    setup: Mutex<Option<LoggerSetup>>,
}

impl LoggerCell {
    pub const fn new() -> Self {
        Self {
            logger: OnceLock::new(),
            setup: parking_lot::const_mutex(None),
        }
    }

    /// Provide the setup for the first `get`
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::AlreadyInitialized`] once the logger has been
    /// built or a setup has already been supplied.
    pub fn configure(&self, setup: LoggerSetup) -> Result<()> {
        let mut slot = self.setup.lock();
        if self.logger.get().is_some() || slot.is_some() {
            return Err(LoggerError::AlreadyInitialized);
        }
        *slot = Some(setup);
        Ok(())
    }

    /// The logger, built on first call
    pub fn get(&self) -> &Logger {
        if let Some(logger) = self.logger.get() {
            return logger;
        }
        // Held until the logger is stored, so `configure` either lands before
        // the build or observes the built logger.
        let mut slot = self.setup.lock();
        self.logger.get_or_init(|| {
            slot.take()
                .unwrap_or_else(|| LoggerSetup::new(LoggerConfig::from_env()))
                .build()
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.logger.get().is_some()
    }
}

impl Default for LoggerCell {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: LoggerCell = LoggerCell::new();

/// Supply the setup for the process-wide logger; see [`LoggerCell::configure`]
///
/// # Errors
///
/// Returns [`LoggerError::AlreadyInitialized`] if called after first use or twice
pub fn configure(setup: LoggerSetup) -> Result<()> {
    GLOBAL.configure(setup)
}

/// The process-wide logger
pub fn logger() -> &'static Logger {
    GLOBAL.get()
}
