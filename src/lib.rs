//! # uda-core
//!
//! Core of a UDA data-access client/server: request-string parsing, file
//! path expansion and the versioned binary encoding of data blocks.
//!
//! ## Architecture
//!
//! - **Request layer**: [`request::RequestParser`] turns a client's
//!   `source` and `signal` strings into a [`RequestDescriptor`];
//!   [`path::PathResolver`] makes client file paths usable server-side.
//! - **Wire layer**: [`codec`] encodes handshake, request and data blocks
//!   at a negotiated protocol version; [`protocol`] frames them and
//!   [`Session`] runs the exchange over any tokio stream.
//!
//! Failures accumulate on a per-request [`ErrorStack`] and are logged
//! through `tracing`; the crate never installs a subscriber.
//!
//! ## Example
//!
//! ```
//! use uda_core::config::Config;
//! use uda_core::error_stack::ErrorStack;
//! use uda_core::request::{PluginRegistry, RequestParser};
//!
//! let config = Config::default();
//! let plugins = PluginRegistry::with_standard_plugins();
//! let parser = RequestParser::new(&config, &plugins);
//! let mut stack = ErrorStack::new();
//!
//! let request = parser.parse("12345/2", "ip", "", &mut stack).unwrap();
//! assert_eq!(request.exp_number, 12345);
//! assert_eq!(request.pass, 2);
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod error_stack;
pub mod path;
pub mod protocol;
pub mod request;
pub mod session;
pub mod strings;

pub use config::Config;
pub use error::{Result, UdaError};
pub use error_stack::ErrorStack;
pub use request::RequestDescriptor;
pub use session::{Role, Session};
