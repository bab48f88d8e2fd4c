//! Plugin registry consulted by the request parser.
//!
//! The registry is an ordered list of reader plugins keyed by format name.
//! Built-in formats keep their well-known [`RequestKind`]; anything else is
//! assigned a sequential id starting at [`PLUGIN_ID_BASE`].
//!
//! # Example
//!
//! ```
//! use uda_core::request::{PluginClass, PluginRegistry, RequestKind};
//!
//! let mut registry = PluginRegistry::new();
//! let kind = registry.register_plugin("NETCDF", PluginClass::File, "nc");
//! assert_eq!(kind, RequestKind::Plugin(100));
//! assert!(registry.by_format("netcdf").is_some());
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UdaError};
use crate::request::{RequestKind, PLUGIN_ID_BASE};

/// Name of the default server-side function library.
pub const SERVERSIDE_FORMAT: &str = "SERVERSIDE";

/// How a plugin interprets the text after its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginClass {
    /// Reads a local or server-visible file.
    File,
    /// Talks to a remote data server.
    Server,
    /// Evaluates a function call.
    Function,
    /// Library of data objects addressed by archive.
    Library,
    /// Alias for another data server, resolved by substitution.
    Device,
}

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Format or device name used as a source prefix.
    pub format: String,
    /// Request kind; `Unknown` entries get an id assigned on registration.
    #[serde(default)]
    pub request: RequestKind,
    /// File extension handled by this plugin (without the dot).
    #[serde(default)]
    pub extension: String,
    pub class: PluginClass,
    /// Protocol substituted for a device prefix.
    #[serde(default)]
    pub device_protocol: String,
    /// Host substituted for a device prefix.
    #[serde(default)]
    pub device_host: String,
    /// Port substituted for a device prefix.
    #[serde(default)]
    pub device_port: Option<u16>,
    #[serde(default)]
    pub description: String,
}

impl PluginEntry {
    /// Create an entry with no extension or device fields.
    pub fn new(format: &str, request: RequestKind, class: PluginClass) -> Self {
        Self {
            format: format.to_string(),
            request,
            extension: String::new(),
            class,
            device_protocol: String::new(),
            device_host: String::new(),
            device_port: None,
            description: String::new(),
        }
    }

    /// Set the handled file extension.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.to_string();
        self
    }

    /// Source prefix that replaces a device name: `PROTOCOL::host[:port]`.
    pub fn device_substitute(&self, delim: &str) -> String {
        match self.device_port {
            Some(port) => format!("{}{}{}:{}", self.device_protocol, delim, self.device_host, port),
            None => format!("{}{}{}", self.device_protocol, delim, self.device_host),
        }
    }
}

/// Ordered plugin registry.
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    entries: Vec<PluginEntry>,
    /// Upper-cased format name to index.
    by_name: HashMap<String, usize>,
    next_plugin_id: i32,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
            next_plugin_id: PLUGIN_ID_BASE,
        }
    }

    /// Registry holding the standard readers.
    pub fn with_standard_plugins() -> Self {
        use PluginClass::*;
        use RequestKind as K;

        let mut registry = Self::new();
        for entry in [
            PluginEntry::new("IDA", K::Ida, File).with_extension("ida"),
            PluginEntry::new("NETCDF", K::Cdf, File).with_extension("nc"),
            PluginEntry::new("HDF5", K::Hdf5, File).with_extension("h5"),
            PluginEntry::new("XML", K::Xml, File).with_extension("xml"),
            PluginEntry::new("UFILE", K::UFile, File),
            PluginEntry::new("CSV", K::Unknown, File).with_extension("csv"),
            PluginEntry::new("MDS", K::Mds, Server),
            PluginEntry::new("UDA", K::ReadUda, Server),
            PluginEntry::new("WEB", K::ReadWeb, Server),
            PluginEntry::new("SQL", K::Sql, Server),
            PluginEntry::new("PPF", K::Ppf, Server),
            PluginEntry::new("JPF", K::Jpf, Server),
            PluginEntry::new("HDATA", K::ReadHData, Server),
            PluginEntry::new("NOTHING", K::Nothing, Server),
            PluginEntry::new(SERVERSIDE_FORMAT, K::ReadServerside, Function),
        ] {
            registry.register(entry);
        }
        registry
    }

    /// Add an entry, assigning a plugin id if it has none.
    ///
    /// A later entry with the same format name shadows the earlier one for
    /// name lookups; both stay in iteration order.
    pub fn register(&mut self, mut entry: PluginEntry) -> RequestKind {
        if entry.request == RequestKind::Unknown {
            entry.request = RequestKind::Plugin(self.next_plugin_id);
            self.next_plugin_id += 1;
        }
        let kind = entry.request;
        self.by_name
            .insert(entry.format.to_uppercase(), self.entries.len());
        self.entries.push(entry);
        kind
    }

    /// Register a plugin by name, class and extension.
    pub fn register_plugin(&mut self, format: &str, class: PluginClass, extension: &str) -> RequestKind {
        self.register(PluginEntry::new(format, RequestKind::Unknown, class).with_extension(extension))
    }

    /// Register a device alias that expands to `protocol::host[:port]`.
    pub fn register_device(&mut self, name: &str, protocol: &str, host: &str, port: Option<u16>) -> RequestKind {
        let mut entry = PluginEntry::new(name, RequestKind::Unknown, PluginClass::Device);
        entry.device_protocol = protocol.to_string();
        entry.device_host = host.to_string();
        entry.device_port = port;
        self.register(entry)
    }

    /// Look up by format name, ignoring case.
    pub fn by_format(&self, format: &str) -> Option<&PluginEntry> {
        self.by_name
            .get(&format.to_uppercase())
            .and_then(|&i| self.entries.get(i))
    }

    /// Look up by request kind.
    pub fn by_request(&self, request: RequestKind) -> Option<&PluginEntry> {
        self.entries.iter().find(|e| e.request == request)
    }

    /// First entry handling `extension`, ignoring case.
    pub fn by_extension(&self, extension: &str) -> Option<&PluginEntry> {
        if extension.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|e| e.extension.eq_ignore_ascii_case(extension))
    }

    /// The default server-side function library.
    pub fn server_side_default(&self) -> Option<&PluginEntry> {
        self.by_request(RequestKind::ReadServerside)
            .or_else(|| self.by_format(SERVERSIDE_FORMAT))
    }

    /// All entries in registration order.
    pub fn entries(&self) -> &[PluginEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a registry from a JSON array of entries.
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is invalid or a device entry has no host.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let entries: Vec<PluginEntry> = serde_json::from_str(text)?;
        let mut registry = Self::new();
        for entry in entries {
            if entry.class == PluginClass::Device && entry.device_host.is_empty() {
                return Err(UdaError::Config(format!(
                    "Device '{}' has no host",
                    entry.format
                )));
            }
            registry.register(entry);
        }
        tracing::debug!(plugins = registry.len(), "plugin registry loaded");
        Ok(registry)
    }

    /// Read and parse a JSON registry file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids_from_base() {
        let mut registry = PluginRegistry::new();
        assert_eq!(registry.register_plugin("A", PluginClass::File, "a"), RequestKind::Plugin(100));
        assert_eq!(registry.register_plugin("B", PluginClass::Library, ""), RequestKind::Plugin(101));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_builtin_kinds_kept() {
        let registry = PluginRegistry::with_standard_plugins();
        assert_eq!(registry.by_format("netcdf").unwrap().request, RequestKind::Cdf);
        assert_eq!(registry.by_format("MDS").unwrap().class, PluginClass::Server);
        assert_eq!(
            registry.server_side_default().unwrap().format,
            SERVERSIDE_FORMAT
        );
        assert!(matches!(
            registry.by_format("CSV").unwrap().request,
            RequestKind::Plugin(_)
        ));
    }

    #[test]
    fn test_lookup_by_extension_and_request() {
        let registry = PluginRegistry::with_standard_plugins();
        assert_eq!(registry.by_extension("NC").unwrap().format, "NETCDF");
        assert!(registry.by_extension("").is_none());
        assert_eq!(registry.by_request(RequestKind::Mds).unwrap().format, "MDS");
    }

    #[test]
    fn test_device_substitute() {
        let mut registry = PluginRegistry::new();
        registry.register_device("JET", "UDA", "data.jet.uk", Some(56565));
        let entry = registry.by_format("JET").unwrap();
        assert_eq!(entry.device_substitute("::"), "UDA::data.jet.uk:56565");
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"format": "NETCDF", "request": "Cdf", "extension": "nc", "class": "file"},
            {"format": "ALIAS", "class": "device", "device_protocol": "UDA", "device_host": "remote"},
            {"format": "MYLIB", "class": "library"}
        ]"#;
        let registry = PluginRegistry::from_json_str(json).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.by_format("ALIAS").unwrap().request, RequestKind::Plugin(100));
        assert_eq!(registry.by_format("mylib").unwrap().request, RequestKind::Plugin(101));
    }

    #[test]
    fn test_from_json_device_without_host() {
        let json = r#"[{"format": "ALIAS", "class": "device"}]"#;
        let result = PluginRegistry::from_json_str(json);
        assert!(result.unwrap_err().to_string().contains("has no host"));
    }
}
