use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use syslog::{Facility, Formatter3164, LoggerBackend};

use crate::{Error, Result};

const LEVEL_ENV: &str = "SENSORLCD_LOG_LEVEL";
const PATH_ENV: &str = "SENSORLCD_LOG_PATH";

/// Log verbosity levels, most severe first.
///
/// `Startup` sits between errors and warnings so start-up banners survive
/// a quiet configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 0,
    Startup = 1,
    #[serde(alias = "warning")]
    Warn = 2,
    #[default]
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Startup => "STARTUP",
            LogLevel::Warn => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "startup" => Ok(LogLevel::Startup),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

type SyslogWriter = syslog::Logger<LoggerBackend, Formatter3164>;

/// Leveled logger writing to stderr, an optional file and optional syslog.
pub struct Logger {
    level: LogLevel,
    file: Option<Mutex<File>>,
    syslog: Option<Mutex<SyslogWriter>>,
}

impl Logger {
    pub fn new(level: LogLevel, file_path: Option<String>, use_syslog: bool) -> Result<Self> {
        let level = std::env::var(LEVEL_ENV)
            .ok()
            .and_then(|s| LogLevel::from_str(&s).ok())
            .unwrap_or(level);

        let path = std::env::var(PATH_ENV).ok().or(file_path);
        let file = match path {
            Some(p) => Some(Mutex::new(
                OpenOptions::new().create(true).append(true).open(&p).map_err(|e| {
                    Error::Io(std::io::Error::new(e.kind(), format!("log file {p}: {e}")))
                })?,
            )),
            None => None,
        };

        let syslog = if use_syslog {
            let formatter = Formatter3164 {
                facility: Facility::LOG_DAEMON,
                hostname: None,
                process: env!("CARGO_PKG_NAME").into(),
                pid: std::process::id(),
            };
            let writer = syslog::unix(formatter)
                .map_err(|e| Error::Io(std::io::Error::other(format!("syslog: {e}"))))?;
            Some(Mutex::new(writer))
        } else {
            None
        };

        Ok(Self {
            level,
            file,
            syslog,
        })
    }

    /// Stderr-only logger.
    pub fn stderr(level: LogLevel) -> Self {
        Self {
            level,
            file: None,
            syslog: None,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn log(&self, level: LogLevel, msg: impl AsRef<str>) {
        if level > self.level {
            return;
        }
        let msg = msg.as_ref();
        let ts = humantime::format_rfc3339_millis(SystemTime::now());
        let line = format!("{ts} | {:<8} | {msg}", level.label());
        eprintln!("{line}");
        if let Some(file) = self.file.as_ref() {
            let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = writeln!(file, "{line}");
        }
        if let Some(writer) = self.syslog.as_ref() {
            let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = match level {
                LogLevel::Error => writer.err(msg),
                LogLevel::Startup => writer.notice(msg),
                LogLevel::Warn => writer.warning(msg),
                LogLevel::Info => writer.info(msg),
                LogLevel::Debug | LogLevel::Trace => writer.debug(msg),
            };
        }
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Error, msg);
    }

    pub fn startup(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Startup, msg);
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Warn, msg);
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Info, msg);
    }

    pub fn debug(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Debug, msg);
    }

    pub fn trace(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Trace, msg);
    }
}
