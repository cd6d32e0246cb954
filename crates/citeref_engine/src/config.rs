use std::path::{Path, PathBuf};

use serde::Deserialize;

use citeref_base::{CiterefError, CiterefResult, ErrorKind};

use crate::ids::{DEFAULT_LINK_PREFIX, DEFAULT_LINK_SUFFIX, ReferenceKeyEncoder};
use crate::result::ResultLimits;

/// Name of the flag that switches reference storage on.
pub const STORAGE_ENABLED_FLAG: &str = "reference_storage_enabled";

/// Read access to boolean site settings.
///
/// The endpoint asks for flags by name so that hosts can back this with
/// whatever configuration system they already have.
pub trait ConfigLookup: Send + Sync + 'static {
    /// Look up a boolean setting. Unknown names are an error.
    fn get_bool(&self, name: &str) -> CiterefResult<bool>;
}

/// Site configuration, read from `citeref.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Whether stored reference data may be served at all.
    pub reference_storage_enabled: bool,
    /// Prefix wrapped around derived reference ids.
    pub references_link_prefix: String,
    /// Suffix wrapped around derived reference ids.
    pub references_link_suffix: String,
    /// JSON file with the stored reference sets, relative to the config file.
    pub data_file: PathBuf,
    pub limits: LimitsConfig,
    pub server: ServerConfig,
}

/// Per-response budgets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Serialized size budget of one response, in bytes.
    pub max_result_size: usize,
    /// Maximum number of pages in one response.
    pub max_pages: usize,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `max-age` of the public Cache-Control header, in seconds.
    pub cache_max_age: u32,
    /// Number of request worker threads.
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reference_storage_enabled: false,
            references_link_prefix: DEFAULT_LINK_PREFIX.to_string(),
            references_link_suffix: DEFAULT_LINK_SUFFIX.to_string(),
            data_file: PathBuf::from("references.json"),
            limits: LimitsConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_result_size: 8 * 1024 * 1024,
            max_pages: 50,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cache_max_age: 300,
            workers: 4,
        }
    }
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> CiterefResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| Box::new(CiterefError::parse("configuration", e.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CiterefResult<()> {
        if self.limits.max_pages == 0 {
            return Err(Box::new(CiterefError::parse(
                "configuration",
                "limits.max_pages must be at least 1",
            )));
        }
        if self.server.workers == 0 {
            return Err(Box::new(CiterefError::parse(
                "configuration",
                "server.workers must be at least 1",
            )));
        }
        Ok(())
    }

    /// Encoder for reference ids using the configured prefix and suffix.
    pub fn key_encoder(&self) -> ReferenceKeyEncoder {
        ReferenceKeyEncoder::new(&self.references_link_prefix, &self.references_link_suffix)
    }

    /// Budgets for a single response.
    pub fn result_limits(&self) -> ResultLimits {
        ResultLimits::new(self.limits.max_result_size, self.limits.max_pages)
    }
}

impl ConfigLookup for Config {
    fn get_bool(&self, name: &str) -> CiterefResult<bool> {
        match name {
            STORAGE_ENABLED_FLAG => Ok(self.reference_storage_enabled),
            _ => Err(Box::new(CiterefError::message(format!(
                "Unknown configuration setting '{}'",
                name
            )))),
        }
    }
}

/// Load the configuration file. A relative `data_file` is resolved against the
/// directory containing the configuration file.
pub fn load_config(path: &Path) -> CiterefResult<Config> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Box::new(CiterefError::new(ErrorKind::FileError {
            path: path.to_path_buf(),
            source: e,
        }))
    })?;
    let mut config = Config::from_toml_str(&text)?;
    if config.data_file.is_relative() {
        if let Some(parent) = path.parent() {
            config.data_file = parent.join(&config.data_file);
        }
    }
    Ok(config)
}
