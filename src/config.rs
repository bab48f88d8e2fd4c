//! Immutable environment configuration.
//!
//! Loaded once at process start (from JSON or built in code) and passed by
//! reference into the path resolver and the request parser.
//!
//! # Example
//!
//! ```
//! use uda_core::config::Config;
//!
//! let config = Config::from_json_str(r#"{ "api_device": "MAST", "api_archive": "MAST" }"#).unwrap();
//! assert_eq!(config.api_delim, "::");
//! assert_eq!(config.api_device, "MAST");
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default API delimiter between prefix and remainder.
pub const DEFAULT_API_DELIM: &str = "::";

/// Default bound on device substitution depth.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Environment defaults consumed by the parser and the path resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delimiter between device/format/archive prefixes and the remainder.
    pub api_delim: String,
    /// Local default device name (transparent when used as a prefix).
    pub api_device: String,
    /// Local default archive name.
    pub api_archive: String,
    /// Default file format for generic pulse paths.
    pub api_format: String,
    /// Scratch directory name (`/scratch/...`).
    pub scratch_name: String,
    /// Network name prepended to scratch paths.
    pub net_name: String,
    /// Host name prepended to scratch paths; resolved from the OS when unset.
    pub host_name: Option<String>,
    /// Delimited list of private path targets.
    pub private_path_target: String,
    /// Delimited list of private path substitutes.
    pub private_path_substitute: String,
    /// Proxy target host; when set every request is forwarded verbatim.
    pub proxy_target: Option<String>,
    /// True on the client. Symlinks are only dereferenced client-side.
    pub client_side: bool,
    /// Command (`cmd -h file`) that succeeds for netCDF-4 files.
    pub netcdf_dump_command: Option<String>,
    /// Command (`cmd file`) that succeeds for legacy IDA files.
    pub ida_dump_command: Option<String>,
    /// Maximum device substitution depth.
    pub max_redirects: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_delim: DEFAULT_API_DELIM.to_string(),
            api_device: String::new(),
            api_archive: String::new(),
            api_format: String::new(),
            scratch_name: "scratch".to_string(),
            net_name: String::new(),
            host_name: None,
            private_path_target: String::new(),
            private_path_substitute: String::new(),
            proxy_target: None,
            client_side: true,
            netcdf_dump_command: None,
            ida_dump_command: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl Config {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid JSON for this structure.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        tracing::debug!(
            device = %config.api_device,
            archive = %config.api_archive,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Delimiter to use for a request: the client's choice or the default.
    pub fn delim_or_default<'a>(&'a self, client_delim: &'a str) -> &'a str {
        if client_delim.is_empty() {
            &self.api_delim
        } else {
            client_delim
        }
    }

    /// Scratch directory prefix that triggers network-path expansion.
    pub fn scratch_prefix(&self) -> String {
        format!("/{}/", self.scratch_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_delim, "::");
        assert_eq!(config.max_redirects, 10);
        assert!(config.client_side);
        assert!(config.proxy_target.is_none());
    }

    #[test]
    fn test_partial_json() {
        let config =
            Config::from_json_str(r#"{"api_delim": "->", "proxy_target": "proxy:56565"}"#)
                .unwrap();
        assert_eq!(config.api_delim, "->");
        assert_eq!(config.proxy_target.as_deref(), Some("proxy:56565"));
        assert_eq!(config.scratch_name, "scratch");
    }

    #[test]
    fn test_invalid_json() {
        let result = Config::from_json_str("{ not json");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("JSON error"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uda.json");
        std::fs::write(&path, r#"{"api_archive": "MAST"}"#).unwrap();
        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.api_archive, "MAST");
    }

    #[test]
    fn test_delim_or_default() {
        let config = Config::default();
        assert_eq!(config.delim_or_default(""), "::");
        assert_eq!(config.delim_or_default("/"), "/");
    }

    #[test]
    fn test_scratch_prefix() {
        let mut config = Config::default();
        assert_eq!(config.scratch_prefix(), "/scratch/");
        config.scratch_name = "tmp".to_string();
        assert_eq!(config.scratch_prefix(), "/tmp/");
    }
}
