use std::{net::SocketAddr, path::PathBuf};

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use crate::Error;

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_VERSION: &str = "0.1.0";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Service configuration
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    version: Version,
    /// Host the HTTP server binds to
    pub host: String,
    /// Port the HTTP server binds to
    pub port: u16,
    /// Directory uploaded image files are written to and served from
    pub upload_dir: PathBuf,
    /// Database connection string, defaults to a SQLite file in the
    /// platform data directory when absent
    pub database_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: Version::parse(CONFIG_VERSION).unwrap(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            database_url: None,
        }
    }
}

impl Config {
    pub const APP_NAME: &'static str = "geoimage";

    /// Load the configuration file, falling back to defaults when it is
    /// missing or its version is incompatible
    pub async fn load() -> Result<Self, Error> {
        let mut config_file_path = crate::config_dir_path(Config::APP_NAME)?;
        config_file_path.push(CONFIG_FILE_NAME);

        if config_file_path.exists() {
            info!(
                "The config file is located at: `{}`",
                config_file_path.display()
            );

            let config = fs::read_to_string(config_file_path).await?;
            let config: Config = toml::from_str(&config)?;

            let req = VersionReq::parse(&format!("^{CONFIG_VERSION}"))?;
            if !req.matches(&config.version) {
                warn!("Ignoring the configuration file because the configuration file version is incompatible");
                Ok(Config::default())
            } else {
                Ok(config)
            }
        } else {
            info!(
                "No config file at: `{}`, using the default configuration",
                config_file_path.display()
            );

            Ok(Config::default())
        }
    }

    /// Socket address the server binds to
    pub fn bind_addr(&self) -> Result<SocketAddr, Error> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
