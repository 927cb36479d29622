//! Configuration manager
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML file,
//! then `UPSCALER_*` environment variables (`__` separates sections, so
//! `UPSCALER_MODEL__TILE_SIZE=128` sets `model.tile_size`).

use std::path::{Path, PathBuf};
use config::{Config, Environment, File, FileFormat};
use tracing::{debug, info};

use common::error::{Error, Result};
use crate::schema::ServiceConfig;
use crate::validation::validate;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "UPSCALER";

/// File name searched for when no explicit path is given
const CONFIG_FILE_NAME: &str = "upscaler.toml";

/// Layered configuration source
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// Merged configuration tree
    inner: Config,

    /// File the configuration was read from, if any
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// Creates a configuration manager, discovering the config file
    pub fn new() -> Result<Self> {
        Self::load(None)
    }

    /// Creates a configuration manager from an explicit file.
    ///
    /// An explicit path that does not exist is an error; a discovered one
    /// is simply skipped.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let source = match path {
            Some(path) if !path.is_file() => {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(),
        };

        let defaults = Config::try_from(&ServiceConfig::default()).map_err(config_error)?;

        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = &source {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("server.allowed_origins"),
        );

        let inner = builder.build().map_err(config_error)?;

        Ok(Self { inner, source })
    }

    /// Finds a config file in the working directory or the user config dir
    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }

        let user = dirs::config_dir()?.join("upscaler").join(CONFIG_FILE_NAME);
        if user.is_file() {
            debug!("Using user configuration at {}", user.display());
            return Some(user);
        }

        None
    }

    /// Returns the file the configuration was read from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Gets a string value
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.inner.get_string(key).map_err(config_error)
    }

    /// Gets an unsigned size value
    pub fn get_usize(&self, key: &str) -> Result<usize> {
        let value = self.inner.get_int(key).map_err(config_error)?;
        usize::try_from(value)
            .map_err(|_| Error::Config(format!("{} must be non-negative, got {}", key, value)))
    }

    /// Gets a port-sized value
    pub fn get_u16(&self, key: &str) -> Result<u16> {
        let value = self.inner.get_int(key).map_err(config_error)?;
        u16::try_from(value)
            .map_err(|_| Error::Config(format!("{} is out of range: {}", key, value)))
    }

    /// Gets a boolean value
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.inner.get_bool(key).map_err(config_error)
    }

    /// Gets a path value
    pub fn get_path(&self, key: &str) -> Result<PathBuf> {
        self.get_string(key).map(PathBuf::from)
    }

    /// Deserializes and validates the whole service configuration
    pub fn service_config(&self) -> Result<ServiceConfig> {
        let config: ServiceConfig = self
            .inner
            .clone()
            .try_deserialize()
            .map_err(config_error)?;
        validate(&config)?;
        Ok(config)
    }

    /// Writes the default configuration as TOML
    pub fn write_default(path: &Path) -> Result<()> {
        let rendered = toml::to_string_pretty(&ServiceConfig::default())
            .map_err(|e| Error::Config(format!("Failed to render defaults: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, rendered)?;

        info!("Wrote default configuration to {}", path.display());
        Ok(())
    }
}

fn config_error(err: config::ConfigError) -> Error {
    Error::Config(err.to_string())
}
