use std::{path::Path, sync::Arc};

use crate::{
    cli::RunOptions,
    clock::{SystemClock, ThreadSleeper},
    config::{Config, DiscoveryConfig, DisplayConfig, PollingConfig, SensorConfig},
    discovery::UdpLocator,
    display::{CharDisplay, Lcd, MemoryDisplay, SharedDisplay},
    poll::{PollLoop, PollSettings, ShutdownToken},
    render::RenderSettings,
    telemetry::HttpFetcher,
    Error, Result,
};

mod lifecycle;
mod logger;
mod pidfile;

pub use logger::{LogLevel, Logger};
pub use pidfile::PidFile;

/// Settings after CLI flags are layered over the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub pid_file: String,
    pub discovery: DiscoveryConfig,
    pub sensor: SensorConfig,
    pub polling: PollingConfig,
    pub display: DisplayConfig,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
    pub syslog: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_sources(Config::default(), RunOptions::default())
    }
}

impl AppConfig {
    pub fn from_sources(config: Config, opts: RunOptions) -> Self {
        let mut display = config.display;
        if let Some(addr) = opts.pcf8574_addr {
            display.pcf8574_addr = addr;
        }
        if let Some(bus) = opts.i2c_bus {
            display.i2c_bus = bus;
        }
        display.headless |= opts.headless;

        let log_file = match opts.log_file {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(path),
            None => config.logging.file_path(),
        };

        Self {
            pid_file: opts.pid_file.unwrap_or(config.pid_file),
            discovery: config.discovery,
            sensor: config.sensor,
            polling: config.polling,
            display,
            log_level: opts.log_level.unwrap_or(config.logging.level),
            log_file,
            syslog: config.logging.syslog,
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            error_threshold: self.polling.error_threshold,
            success_hold_secs: self.polling.success_hold_secs,
            failure_hold_secs: self.polling.failure_hold_secs,
            render: RenderSettings::from(&self.display),
        }
    }
}

pub struct App {
    config: AppConfig,
    logger: Arc<Logger>,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let logger = Logger::new(config.log_level, config.log_file.clone(), config.syslog)?;
        Ok(Self {
            config,
            logger: Arc::new(logger),
        })
    }

    /// Load the config file (`--config` or the per-user default) and apply CLI overrides.
    pub fn from_options(opts: RunOptions) -> Result<Self> {
        let cfg_file = match opts.config.as_deref() {
            Some(path) => Config::load_from_path(Path::new(path))?,
            None => Config::load_or_default()?,
        };
        Self::new(AppConfig::from_sources(cfg_file, opts))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Entry point for the daemon: take the PID lock, open the display and poll forever.
    pub fn run(&self) -> Result<()> {
        let _pid = PidFile::acquire(&self.config.pid_file).inspect_err(|err| {
            if matches!(err, Error::AlreadyRunning(_)) {
                self.logger.error(err.to_string());
            } else {
                self.logger.error(format!("PID file error: {err}"));
            }
        })?;
        self.logger.startup(format!(
            "sensorlcd {} is starting up",
            env!("CARGO_PKG_VERSION")
        ));

        if self.config.display.headless {
            self.logger.info("headless mode: rendering to an in-memory display");
            self.run_with(SharedDisplay::new(MemoryDisplay::new()))
        } else {
            self.logger.info(format!(
                "Initializing LCD display (i2c bus {}, address {})",
                self.config.display.i2c_bus,
                String::from(self.config.display.pcf8574_addr.clone())
            ));
            let lcd = Lcd::open(self.config.display.i2c_bus, &self.config.display.pcf8574_addr)?;
            self.run_with(SharedDisplay::new(lcd))
        }
    }

    fn run_with<D>(&self, display: SharedDisplay<D>) -> Result<()>
    where
        D: CharDisplay + Send + 'static,
    {
        let shutdown = ShutdownToken::new();
        lifecycle::install_shutdown_handler(
            display.clone(),
            shutdown.clone(),
            Arc::clone(&self.logger),
        )?;

        let mut display = display;
        self.logger.debug("Clearing LCD display");
        display.clear()?;

        let locator = UdpLocator::new(
            self.config.discovery.clone(),
            ThreadSleeper,
            Arc::clone(&self.logger),
        );
        let fetcher = HttpFetcher::new(&self.config.sensor)
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;

        let mut poll = PollLoop::new(
            locator,
            fetcher,
            display,
            ThreadSleeper,
            SystemClock,
            self.config.poll_settings(),
        )
        .with_shutdown(shutdown)
        .with_logger(Arc::clone(&self.logger));
        poll.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Pcf8574Addr;

    #[test]
    fn cli_flags_override_file_values() {
        let mut file = Config::default();
        file.pid_file = "/tmp/from-file.pid".into();
        file.display.i2c_bus = 0;
        file.logging.level = LogLevel::Warn;

        let opts = RunOptions {
            pcf8574_addr: Some(Pcf8574Addr::Addr(0x3f)),
            i2c_bus: Some(3),
            log_level: Some(LogLevel::Trace),
            log_file: Some(String::new()),
            pid_file: Some("/tmp/from-cli.pid".into()),
            headless: true,
            ..RunOptions::default()
        };
        let cfg = AppConfig::from_sources(file, opts);
        assert_eq!(cfg.pid_file, "/tmp/from-cli.pid");
        assert_eq!(cfg.display.pcf8574_addr, Pcf8574Addr::Addr(0x3f));
        assert_eq!(cfg.display.i2c_bus, 3);
        assert!(cfg.display.headless);
        assert_eq!(cfg.log_level, LogLevel::Trace);
        assert_eq!(cfg.log_file, None);
    }

    #[test]
    fn file_values_apply_when_cli_is_silent() {
        let mut file = Config::default();
        file.polling.error_threshold = 2;
        file.display.temperature_unit = 'C';
        file.logging.file = "/tmp/sensorlcd-test.log".into();
        let cfg = AppConfig::from_sources(file.clone(), RunOptions::default());
        assert_eq!(cfg.pid_file, file.pid_file);
        assert_eq!(cfg.display, file.display);
        assert_eq!(cfg.log_file.as_deref(), Some("/tmp/sensorlcd-test.log"));
        let settings = cfg.poll_settings();
        assert_eq!(settings.error_threshold, 2);
        assert_eq!(settings.render.temperature_unit, 'C');
    }

    #[test]
    fn from_options_reads_explicit_config_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[logging]\nfile = \"\"\n\n[display]\nheadless = true\n",
        )
        .unwrap();
        let opts = RunOptions {
            config: Some(path.to_string_lossy().into_owned()),
            ..RunOptions::default()
        };
        let app = App::from_options(opts).unwrap();
        assert!(app.config().display.headless);
        assert_eq!(app.config().log_file, None);
    }

    #[test]
    fn from_options_rejects_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sensor]\ndata_path = \"data\"\n").unwrap();
        let opts = RunOptions {
            config: Some(path.to_string_lossy().into_owned()),
            ..RunOptions::default()
        };
        let err = App::from_options(opts).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
