use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;

use crate::{Error, Result};

use super::{Config, CONFIG_FILE_NAME};

/// Load the per-user config, writing the defaults out on first run.
pub fn load_or_default() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        let cfg = Config::default();
        cfg.save_to_path(&path)?;
        return Ok(cfg);
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        super::validate(&cfg)?;
        return Ok(cfg);
    }
    let raw = fs::read_to_string(path)?;
    parse(&raw).map_err(|err| match err {
        Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
        other => other,
    })
}

pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("cannot serialize config: {e}")))?;
    fs::write(path, format!("# sensorlcd config\n{body}"))?;
    Ok(())
}

pub fn parse(raw: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
    super::validate(&cfg)?;
    Ok(cfg)
}

pub fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "sensorlcd").ok_or_else(|| {
        Error::InvalidArgs("HOME not set; cannot locate config directory".into())
    })?;
    Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
}
