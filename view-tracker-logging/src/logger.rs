use crate::{Error, Result};
use log::{info, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::{Config, Handle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

const LOG_FORMAT_CONSOLE: &str = "\x1B[37m{d(%Y-%m-%d %H:%M:%S%.3f)}\x1B[0m {h({l:>5.5})} \x1B[37m---\x1B[0m \x1B[37m[{T:>15.15}]\x1B[0m \x1B[36m{t:<40.40}\x1B[0m \x1B[37m:\x1B[0m {m}{n}";
const LOG_FORMAT_FILE: &str =
    "{d(%Y-%m-%d %H:%M:%S%.3f)} {l:>5.5} --- [{T:>15.15}] {t:<40.40} : {m}{n}";
const CONSOLE_APPENDER: &str = "stdout";
const FILE_APPENDER: &str = "file";
const ROLLED_FILE_PATTERN: &str = "view-tracker.{}.log";
const ROLLED_FILE_COUNT: u32 = 3;
const LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Parse the given log level name, e.g. `debug`.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(level.trim()).map_err(|_| Error::InvalidLevel(level.to_string()))
}

/// The process wide logger of the view tracker applications.
#[derive(Debug)]
pub struct TrackerLogger {
    handle: Handle,
}

impl TrackerLogger {
    /// Returns a builder instance for the logger.
    pub fn builder() -> TrackerLoggerBuilder {
        TrackerLoggerBuilder::default()
    }

    /// Create a new logging instance.
    ///
    /// Only a single logger can be created for the lifetime of the process.
    pub fn new(
        root_level: LevelFilter,
        config_path: Option<impl AsRef<Path>>,
        log_path: Option<impl AsRef<Path>>,
        loggers: Vec<(String, LevelFilter)>,
    ) -> Result<Self> {
        if let Some(path) = config_path.as_ref() {
            if !path.as_ref().exists() {
                return Err(Error::NotFound(path.as_ref().to_path_buf()));
            }
        }

        if INITIALIZED.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyInitialized);
        }

        let config = match config_path {
            Some(path) => Self::load_from_config(path)?,
            None => Self::create_config(root_level, log_path, loggers)?,
        };

        let handle =
            log4rs::init_config(config).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        info!("View tracker logger has been initialized");
        Ok(Self { handle })
    }

    /// Returns the root logging level of the logger.
    pub fn root_log_level(&self) -> LevelFilter {
        self.handle.max_log_level()
    }

    fn load_from_config(path: impl AsRef<Path>) -> Result<Config> {
        log4rs::config::load_config_file(path, Default::default())
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    fn create_config(
        root_level: LevelFilter,
        log_path: Option<impl AsRef<Path>>,
        loggers: Vec<(String, LevelFilter)>,
    ) -> Result<Config> {
        let mut root = Root::builder().appender(CONSOLE_APPENDER);
        let mut config_builder = Config::builder().appender(
            Appender::builder().build(
                CONSOLE_APPENDER,
                Box::new(
                    ConsoleAppender::builder()
                        .encoder(Box::new(PatternEncoder::new(LOG_FORMAT_CONSOLE)))
                        .build(),
                ),
            ),
        );

        if let Some(path) = log_path {
            config_builder = config_builder.appender(Self::create_file_appender(path)?);
            root = root.appender(FILE_APPENDER);
        }

        for (logger, level) in loggers.into_iter() {
            config_builder = config_builder.logger(Logger::builder().build(logger, level));
        }

        config_builder
            .build(root.build(root_level))
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    fn create_file_appender(path: impl AsRef<Path>) -> Result<Appender> {
        let path = path.as_ref();
        let directory = path
            .parent()
            .map(|e| e.to_path_buf())
            .unwrap_or_default();
        std::fs::create_dir_all(&directory)?;

        // rolled files are stored next to the active log file
        let rolled_pattern = directory.join(ROLLED_FILE_PATTERN);
        let roller = FixedWindowRoller::builder()
            .base(1)
            .build(rolled_pattern.to_string_lossy().as_ref(), ROLLED_FILE_COUNT)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let policy = CompoundPolicy::new(
            Box::new(SizeTrigger::new(LOG_FILE_SIZE)),
            Box::new(roller),
        );

        Ok(Appender::builder().build(
            FILE_APPENDER,
            Box::new(
                RollingFileAppender::builder()
                    .encoder(Box::new(PatternEncoder::new(LOG_FORMAT_FILE)))
                    .append(false)
                    .build(path, Box::new(policy))
                    .map_err(|e| Error::InvalidConfig(e.to_string()))?,
            ),
        ))
    }
}

#[derive(Debug, Default)]
pub struct TrackerLoggerBuilder {
    root_level: Option<LevelFilter>,
    config_path: Option<PathBuf>,
    log_path: Option<PathBuf>,
    loggers: HashMap<String, LevelFilter>,
}

impl TrackerLoggerBuilder {
    /// Set the root level of the logger.
    pub fn root_level(&mut self, level: LevelFilter) -> &mut Self {
        self.root_level = Some(level);
        self
    }

    /// Set the path of the log4rs yaml config to load.
    /// When set, all other options of the builder are ignored.
    pub fn config_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the log file path of the logger.
    pub fn log_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.log_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Add a log level filter for the given package.
    pub fn logger<S: AsRef<str>>(&mut self, package: S, level: LevelFilter) -> &mut Self {
        self.loggers.insert(package.as_ref().to_string(), level);
        self
    }

    /// Consumes the builder options and creates the logging instance.
    pub fn build(&mut self) -> Result<TrackerLogger> {
        let root_level = self.root_level.take().unwrap_or(LevelFilter::Info);
        let config_path = self.config_path.take();
        let log_path = self.log_path.take();
        let loggers = self.loggers.drain().collect::<Vec<_>>();

        TrackerLogger::new(root_level, config_path, log_path, loggers)
    }
}
