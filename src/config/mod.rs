//! Service configuration
//!
//! The configuration is a TOML file with three tables:
//!
//! ```toml
//! [service]
//! access_url = "http://localhost/cgi-bin/eowcs"
//! output_prefix_url = "http://localhost/output/"
//!
//! [paths]
//! temporary_output_directory = "/tmp"
//! log_file = "/var/log/eowcs.log"
//! dataset_catalogs = ["/etc/eowcs/datasets.xml"]
//!
//! [tools]
//! gdalinfo = "gdalinfo"
//! gdal_translate = "gdal_translate"
//! gdal_warp = "gdalwarp"
//! kakadu_compress = "kdu_compress"
//! timeout_secs = 600
//! ```
//!
//! Every key is optional.

pub mod catalog;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;

pub use catalog::{CatalogEntry, DatasetCatalog};

use crate::errors::{WcsError, WcsResult};

const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Paths of the external tools
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPaths {
    pub gdalinfo: String,
    pub gdal_translate: String,
    pub gdal_warp: String,
    pub kakadu_compress: String,
    pub timeout: Duration,
}

impl Default for ToolPaths {
    fn default() -> Self {
        ToolPaths {
            gdalinfo: "gdalinfo".to_string(),
            gdal_translate: "gdal_translate".to_string(),
            gdal_warp: "gdalwarp".to_string(),
            kakadu_compress: "kdu_compress".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Settings of one service installation
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub access_url: String,
    /// Prefix of the URL under which stored coverages are published
    pub output_prefix_url: String,
    pub temporary_output_directory: PathBuf,
    pub log_file: Option<PathBuf>,
    pub dataset_catalogs: Vec<PathBuf>,
    pub tools: ToolPaths,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            access_url: "http://localhost/cgi-bin/eowcs".to_string(),
            output_prefix_url: String::new(),
            temporary_output_directory: std::env::temp_dir(),
            log_file: None,
            dataset_catalogs: Vec::new(),
            tools: ToolPaths::default(),
        }
    }
}

impl ServiceConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> WcsResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            WcsError::no_applicable("Configuration", format!("Cannot read {}: {}", path.display(), e))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml(&content)
    }

    /// Parse configuration text, filling absent keys with defaults
    pub fn from_toml(content: &str) -> WcsResult<Self> {
        let value: toml::Value = content
            .parse()
            .map_err(|e| WcsError::no_applicable("Configuration", format!("Failed to parse TOML: {}", e)))?;

        let mut config = ServiceConfig::default();
        let text = |table: &str, key: &str| -> Option<String> {
            value.get(table)?.get(key)?.as_str().map(str::to_string)
        };

        if let Some(url) = text("service", "access_url") {
            config.access_url = url;
        }
        if let Some(url) = text("service", "output_prefix_url") {
            config.output_prefix_url = url;
        }
        if let Some(dir) = text("paths", "temporary_output_directory") {
            config.temporary_output_directory = PathBuf::from(dir);
        }
        config.log_file = text("paths", "log_file").filter(|s| !s.is_empty()).map(PathBuf::from);

        // A single string may list several catalogs separated by ',' or ';'
        match value.get("paths").and_then(|p| p.get("dataset_catalogs")) {
            Some(toml::Value::Array(items)) => {
                config.dataset_catalogs = items.iter().filter_map(|v| v.as_str()).map(PathBuf::from).collect();
            }
            Some(toml::Value::String(list)) => {
                config.dataset_catalogs = list
                    .split([',', ';'])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect();
            }
            _ => {}
        }

        let tools = &mut config.tools;
        for (key, slot) in [
            ("gdalinfo", &mut tools.gdalinfo),
            ("gdal_translate", &mut tools.gdal_translate),
            ("gdal_warp", &mut tools.gdal_warp),
            ("kakadu_compress", &mut tools.kakadu_compress),
        ] {
            if let Some(path) = text("tools", key) {
                *slot = path;
            }
        }
        if let Some(secs) = value.get("tools").and_then(|t| t.get("timeout_secs")).and_then(|v| v.as_integer()) {
            if secs <= 0 {
                return Err(WcsError::no_applicable("Configuration", "tools.timeout_secs must be positive"));
            }
            tools.timeout = Duration::from_secs(secs as u64);
        }

        Ok(config)
    }

    /// Load every configured dataset catalog into one
    pub fn load_catalog(&self) -> WcsResult<DatasetCatalog> {
        let mut catalog = DatasetCatalog::default();
        for path in &self.dataset_catalogs {
            catalog.merge(DatasetCatalog::load(path)?);
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_toml("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.tools.gdal_warp, "gdalwarp");
        assert_eq!(config.tools.timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_full_configuration() {
        let config = ServiceConfig::from_toml(
            r#"
            [service]
            access_url = "http://example.org/wcs"
            output_prefix_url = "http://example.org/out/"

            [paths]
            temporary_output_directory = "/data/tmp"
            log_file = "/var/log/eowcs.log"
            dataset_catalogs = "a.xml; b.xml"

            [tools]
            gdal_warp = "/usr/local/bin/gdalwarp"
            timeout_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.access_url, "http://example.org/wcs");
        assert_eq!(config.temporary_output_directory, PathBuf::from("/data/tmp"));
        assert_eq!(config.log_file, Some(PathBuf::from("/var/log/eowcs.log")));
        assert_eq!(config.dataset_catalogs, vec![PathBuf::from("a.xml"), PathBuf::from("b.xml")]);
        assert_eq!(config.tools.gdal_warp, "/usr/local/bin/gdalwarp");
        assert_eq!(config.tools.gdalinfo, "gdalinfo");
        assert_eq!(config.tools.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_bad_timeout() {
        assert!(ServiceConfig::from_toml("[tools]\ntimeout_secs = 0").is_err());
        assert!(ServiceConfig::from_toml("[tools\n").is_err());
    }
}
