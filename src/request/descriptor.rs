//! The parsed request descriptor and its parts.

use serde::{Deserialize, Serialize};

/// Maximum number of dimensions an array subset may address.
pub const MAX_SUBSET_RANK: usize = 10;

/// First id handed out to registry plugins without a built-in kind.
pub const PLUGIN_ID_BASE: i32 = 100;

/// What kind of reader a request resolves to.
///
/// Ids are stable on the wire. Kinds registered at run time carry their
/// own id in [`RequestKind::Plugin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RequestKind {
    #[default]
    Unknown,
    Generic,
    Ida,
    Mds,
    Ppf,
    Jpf,
    Sql,
    Cdf,
    Hdf5,
    Xml,
    UFile,
    File,
    Format,
    Test,
    Nothing,
    /// Forward to another UDA server.
    ReadUda,
    ReadHData,
    /// Server-side function library.
    ReadServerside,
    ReadWeb,
    ReadXmlDefined,
    Plugin(i32),
}

impl RequestKind {
    /// Wire id.
    pub fn id(self) -> i32 {
        match self {
            RequestKind::Unknown => 0,
            RequestKind::Generic => 1,
            RequestKind::Ida => 2,
            RequestKind::Mds => 3,
            RequestKind::Ppf => 4,
            RequestKind::Jpf => 5,
            RequestKind::Sql => 6,
            RequestKind::Cdf => 7,
            RequestKind::Hdf5 => 8,
            RequestKind::Xml => 9,
            RequestKind::UFile => 10,
            RequestKind::File => 11,
            RequestKind::Format => 12,
            RequestKind::Test => 13,
            RequestKind::Nothing => 14,
            RequestKind::ReadUda => 15,
            RequestKind::ReadHData => 16,
            RequestKind::ReadServerside => 17,
            RequestKind::ReadWeb => 18,
            RequestKind::ReadXmlDefined => 19,
            RequestKind::Plugin(id) => id,
        }
    }

    /// Kind for a wire id.
    pub fn from_id(id: i32) -> Self {
        match id {
            0 => RequestKind::Unknown,
            1 => RequestKind::Generic,
            2 => RequestKind::Ida,
            3 => RequestKind::Mds,
            4 => RequestKind::Ppf,
            5 => RequestKind::Jpf,
            6 => RequestKind::Sql,
            7 => RequestKind::Cdf,
            8 => RequestKind::Hdf5,
            9 => RequestKind::Xml,
            10 => RequestKind::UFile,
            11 => RequestKind::File,
            12 => RequestKind::Format,
            13 => RequestKind::Test,
            14 => RequestKind::Nothing,
            15 => RequestKind::ReadUda,
            16 => RequestKind::ReadHData,
            17 => RequestKind::ReadServerside,
            18 => RequestKind::ReadWeb,
            19 => RequestKind::ReadXmlDefined,
            other if other < 0 => RequestKind::Unknown,
            other => RequestKind::Plugin(other),
        }
    }

    /// True once a parse has classified the request.
    pub fn is_resolved(self) -> bool {
        self != RequestKind::Unknown
    }
}

/// One `name=value` argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValue {
    /// The trimmed source text of the pair.
    pub pair: String,
    pub name: String,
    pub value: String,
}

impl NameValue {
    /// Create a pair whose source text is `name=value`.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        Self {
            pair: format!("{}={}", name, value),
            name,
            value,
        }
    }
}

/// Slice of one dimension.
///
/// `stop == -1` means "to the end"; `start == -1` with `is_index` means
/// "the last element". `count == -1` is resolved against the dimension
/// length by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsetDim {
    pub start: i64,
    pub stop: i64,
    pub stride: i64,
    pub count: i64,
    pub is_index: bool,
}

impl Default for SubsetDim {
    fn default() -> Self {
        Self {
            start: 0,
            stop: -1,
            stride: 1,
            count: -1,
            is_index: false,
        }
    }
}

impl SubsetDim {
    /// Concrete `(start, stop, count)` for a dimension of `len` elements.
    ///
    /// Returns `None` when the slice falls outside the dimension.
    pub fn resolve(&self, len: i64) -> Option<(i64, i64, i64)> {
        if len <= 0 {
            return None;
        }
        let start = if self.start < 0 { len - 1 } else { self.start };
        let stop = if self.is_index && self.start < 0 {
            start
        } else if self.is_index {
            self.start
        } else if self.stop < 0 {
            len - 1
        } else {
            self.stop
        };
        if start >= len || stop >= len || stop < start {
            return None;
        }
        let count = (stop - start) / self.stride + 1;
        Some((start, stop, count))
    }
}

/// Parsed array subset: one entry per addressed dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSubset {
    pub dims: Vec<SubsetDim>,
}

impl DataSubset {
    /// Number of addressed dimensions.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Check if no subset was requested.
    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }
}

/// Fully parsed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub request: RequestKind,
    /// Pulse/experiment number, 0 when unset.
    pub exp_number: i32,
    /// Pass number, -1 for latest.
    pub pass: i32,
    /// Free text pass qualifier.
    pub tpass: String,
    pub archive: String,
    pub device_name: String,
    pub server: String,
    pub path: String,
    pub file: String,
    pub format: String,
    /// Server-side function name.
    pub function: String,
    /// Data object name, subset syntax stripped.
    pub signal: String,
    /// Raw subset expression text.
    pub subset: String,
    /// Source string as received.
    pub source: String,
    pub api_delim: String,
    pub name_values: Vec<NameValue>,
    pub datasubset: DataSubset,
    /// Put (write) request flag.
    pub put: bool,
}

impl Default for RequestDescriptor {
    fn default() -> Self {
        Self {
            request: RequestKind::Unknown,
            exp_number: 0,
            pass: -1,
            tpass: String::new(),
            archive: String::new(),
            device_name: String::new(),
            server: String::new(),
            path: String::new(),
            file: String::new(),
            format: String::new(),
            function: String::new(),
            signal: String::new(),
            subset: String::new(),
            source: String::new(),
            api_delim: String::new(),
            name_values: Vec::new(),
            datasubset: DataSubset::default(),
            put: false,
        }
    }
}

impl RequestDescriptor {
    /// Create an unparsed descriptor holding the raw inputs.
    pub fn new(source: &str, signal: &str, api_delim: &str) -> Self {
        Self {
            source: source.to_string(),
            signal: signal.to_string(),
            api_delim: api_delim.to_string(),
            ..Self::default()
        }
    }

    /// Value of the first argument called `name` (case-insensitive).
    pub fn name_value(&self, name: &str) -> Option<&str> {
        self.name_values
            .iter()
            .find(|nv| nv.name.eq_ignore_ascii_case(name))
            .map(|nv| nv.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_kind_ids_roundtrip() {
        for id in 0..=19 {
            assert_eq!(RequestKind::from_id(id).id(), id);
        }
        assert_eq!(RequestKind::from_id(104), RequestKind::Plugin(104));
        assert_eq!(RequestKind::from_id(-3), RequestKind::Unknown);
    }

    #[test]
    fn test_descriptor_defaults() {
        let request = RequestDescriptor::default();
        assert_eq!(request.pass, -1);
        assert_eq!(request.exp_number, 0);
        assert!(!request.request.is_resolved());
    }

    #[test]
    fn test_name_value_lookup() {
        let mut request = RequestDescriptor::new("", "f(a=1)", "::");
        request.name_values.push(NameValue::new("Shot", "42"));
        assert_eq!(request.name_value("shot"), Some("42"));
        assert_eq!(request.name_value("pass"), None);
        assert_eq!(request.name_values[0].pair, "Shot=42");
    }

    #[test]
    fn test_subset_dim_resolve() {
        let range = SubsetDim {
            start: 10,
            stop: 20,
            stride: 2,
            count: 6,
            is_index: false,
        };
        assert_eq!(range.resolve(100), Some((10, 20, 6)));
        assert_eq!(range.resolve(15), None);

        let last = SubsetDim {
            start: -1,
            stop: -1,
            stride: 1,
            count: 1,
            is_index: true,
        };
        assert_eq!(last.resolve(7), Some((6, 6, 1)));

        assert_eq!(SubsetDim::default().resolve(5), Some((0, 4, 5)));
    }
}
