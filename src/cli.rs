use crate::{app::LogLevel, config::Pcf8574Addr, Error, Result};

/// Options for the `run` command; values are `None` when not provided on CLI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub config: Option<String>,
    pub pcf8574_addr: Option<Pcf8574Addr>,
    pub i2c_bus: Option<u8>,
    pub log_level: Option<LogLevel>,
    pub log_file: Option<String>,
    pub pid_file: Option<String>,
    pub headless: bool,
}

/// Parsed command-line intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunOptions),
    ShowHelp,
    ShowVersion,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut iter = args.iter();
        match iter.next().map(|s| s.as_str()) {
            None => Ok(Command::Run(RunOptions::default())),
            Some("run") => Ok(Command::Run(parse_run_options(&mut iter)?)),
            Some("--help") | Some("-h") => Ok(Command::ShowHelp),
            Some("--version") | Some("-V") => Ok(Command::ShowVersion),
            Some(flag) if flag.starts_with('-') => {
                // `run` is implicit when the first argument is a flag.
                Ok(Command::Run(parse_run_options(&mut args.iter())?))
            }
            Some(cmd) => Err(Error::InvalidArgs(format!(
                "unknown command '{cmd}', try --help"
            ))),
        }
    }

    pub fn help() -> &'static str {
        concat!(
            "sensorlcd - network sensor to LCD monitor\n",
            "\n",
            "USAGE:\n",
            "  sensorlcd run [--config <path>] [--pcf8574-addr <auto|0xNN>] [--i2c-bus <number>]\n",
            "                [--log-level <level>] [--log-file <path>] [--pid-file <path>] [--headless]\n",
            "  sensorlcd --help\n",
            "  sensorlcd --version\n",
            "\n",
            "OPTIONS:\n",
            "  --config <path>          Config file (default: ~/.config/sensorlcd/config.toml)\n",
            "  --pcf8574-addr <addr>    LCD backpack address, or auto to probe 0x27..0x20 (default: auto)\n",
            "  --i2c-bus <number>       I2C bus number (default: 1)\n",
            "  --log-level <level>      error|startup|warn|info|debug|trace (default: info)\n",
            "  --log-file <path>        Append logs to this file; empty disables (default: /var/log/sensorlcd.log)\n",
            "  --pid-file <path>        Single-instance lock file (default: /run/sensorlcd.pid)\n",
            "  --headless               Render to memory instead of the LCD\n",
            "  -h, --help               Show this help\n",
            "  -V, --version            Show version\n",
        )
    }

    pub fn print_help() {
        println!("{}", Self::help());
    }
}

fn parse_run_options(iter: &mut std::slice::Iter<String>) -> Result<RunOptions> {
    let mut opts = RunOptions::default();

    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--config" => {
                opts.config = Some(take_value(flag, iter)?);
            }
            "--pcf8574-addr" => {
                let raw = take_value(flag, iter)?;
                opts.pcf8574_addr = Some(
                    raw.parse()
                        .map_err(|e: String| Error::InvalidArgs(format!("--pcf8574-addr: {e}")))?,
                );
            }
            "--i2c-bus" => {
                let raw = take_value(flag, iter)?;
                opts.i2c_bus = Some(raw.parse().map_err(|_| {
                    Error::InvalidArgs("i2c-bus must be an integer between 0 and 255".to_string())
                })?);
            }
            "--log-level" => {
                let raw = take_value(flag, iter)?;
                opts.log_level = Some(
                    raw.parse()
                        .map_err(|e: String| Error::InvalidArgs(format!("--log-level: {e}")))?,
                );
            }
            "--log-file" => {
                opts.log_file = Some(take_value(flag, iter)?);
            }
            "--pid-file" => {
                opts.pid_file = Some(take_value(flag, iter)?);
            }
            "--headless" => opts.headless = true,
            other => {
                return Err(Error::InvalidArgs(format!(
                    "unknown flag '{other}', try --help"
                )));
            }
        }
    }

    Ok(opts)
}

fn take_value(flag: &str, iter: &mut std::slice::Iter<String>) -> Result<String> {
    iter.next()
        .cloned()
        .ok_or_else(|| Error::InvalidArgs(format!("expected a value after {flag}")))
}
