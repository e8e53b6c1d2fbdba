//! Config file discovery and loading.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{Config, Error, Result};

pub const CONFIG_FILE_NAME: &str = "remoting.toml";
/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "REMOTING_CONFIG";

/// Locate the config file: the explicit path, then `$REMOTING_CONFIG`, then
/// `./remoting.toml`, then the platform config directory. An explicit path
/// is returned even when it does not exist.
pub fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    directories::ProjectDirs::from("", "", "remoting")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}

/// Load the discovered config file, or the defaults when there is none.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    match discover(explicit) {
        Some(path) => load_from(&path),
        None => {
            info!("no config file found, using defaults");
            Ok(Config::default())
        },
    }
}

/// Parse and validate one config file. Relative seed paths resolve against
/// the file's directory.
pub fn load_from(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: Config = toml::from_str(&text).map_err(|source| Error::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    for model in &mut config.models {
        if let Some(seed) = &model.seed
            && seed.is_relative()
        {
            model.seed = Some(base.join(seed));
        }
    }
    config.validate()?;
    debug!(path = %path.display(), models = config.models.len(), "config loaded");
    Ok(config)
}
