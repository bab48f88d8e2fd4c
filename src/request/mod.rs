//! Request parsing: from client source/signal strings to a
//! [`RequestDescriptor`].
//!
//! - [`RequestParser`]: the staged source/signal parser
//! - [`parse_pairs`]: function argument lists
//! - [`parse_subset`] / [`extract_subset`]: array subset suffixes
//! - [`PluginRegistry`]: reader plugins addressed by prefix

mod decompose;
mod descriptor;
mod format;
mod name_value;
mod parser;
mod registry;
mod subset;

pub use decompose::{decompose_mds, decompose_server_url, decompose_sql};
pub use descriptor::{
    DataSubset, NameValue, RequestDescriptor, RequestKind, SubsetDim, MAX_SUBSET_RANK,
    PLUGIN_ID_BASE,
};
pub use format::identify_file_format;
pub use name_value::{parse_pairs, render_pairs, DEFAULT_PAIR_DELIMITER};
pub use parser::{extract_function_name, RequestParser};
pub use registry::{PluginClass, PluginEntry, PluginRegistry, SERVERSIDE_FORMAT};
pub use subset::{extract_subset, parse_dimension, parse_subset, ExtractedSubset};
