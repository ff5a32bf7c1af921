pub mod app;
pub mod cli;
pub mod clock;
pub mod config;
pub mod discovery;
pub mod display;
pub mod heartbeat;
pub mod lcd_driver;
pub mod poll;
pub mod render;
pub mod telemetry;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("line is {len} characters, display holds {max}")]
    LineTooLong { len: usize, max: usize },
    #[error("display error: {0}")]
    Display(String),
    #[error("{0} is already running")]
    AlreadyRunning(String),
}
