//! Optional configuration file.
//!
//! Settings the operator does not want to repeat on every invocation live
//! in an INI file under the platform config directory
//! (`~/.config/warcfetch/config.ini` on Linux):
//!
//! ```ini
//! [api]
//! base_uri = https://partner.archive-it.org/wasapi/v1/webdata
//! username = alice
//!
//! [downloads]
//! destination = /data/warcs
//! concurrency = 8
//! retries = 4
//! page_size = 500
//! ```
//!
//! Command-line flags always win over file values; a missing file simply
//! yields defaults. Passwords never live here.

use std::path::PathBuf;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

/// Name of the directory under the platform config dir.
const CONFIG_DIR: &str = "warcfetch";

/// Name of the config file itself.
const CONFIG_FILE: &str = "config.ini";

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("invalid value for {key} in {path}: {value}")]
    InvalidValue {
        path: PathBuf,
        key: String,
        value: String,
    },
}

/// `[api]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiSection {
    pub base_uri: Option<String>,
    pub username: Option<String>,
}

/// `[downloads]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadsSection {
    pub destination: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub retries: Option<u32>,
    pub page_size: Option<u32>,
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub api: ApiSection,
    pub downloads: DownloadsSection,
}

impl ConfigFile {
    /// Default location under the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location.
    ///
    /// A missing file is not an error; callers typically use
    /// `ConfigFile::load().unwrap_or_default()`.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let ini = Ini::load_from_file(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            source: e,
        })?;
        debug!(path = %path.display(), "config file loaded");
        Self::from_ini(&ini, &path)
    }

    fn from_ini(ini: &Ini, path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("api")) {
            config.api.base_uri = section.get("base_uri").map(str::to_string);
            config.api.username = section.get("username").map(str::to_string);
        }

        if let Some(section) = ini.section(Some("downloads")) {
            config.downloads.destination = section.get("destination").map(PathBuf::from);
            config.downloads.concurrency =
                parse_numeric(section.get("concurrency"), path, "downloads.concurrency")?;
            config.downloads.retries =
                parse_numeric(section.get("retries"), path, "downloads.retries")?;
            config.downloads.page_size =
                parse_numeric(section.get("page_size"), path, "downloads.page_size")?;
        }

        Ok(config)
    }
}

fn parse_numeric<T: std::str::FromStr>(
    value: Option<&str>,
    path: &std::path::Path,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                path: path.to_path_buf(),
                key: key.to_string(),
                value: raw.to_string(),
            }),
    }
}
