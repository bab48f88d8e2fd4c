//! Error types for uda-core.

use thiserror::Error;

use crate::error_stack::ErrorKind;

/// Generic failure code used by the parser and path resolver.
pub const CODE_ERROR: i32 = 999;

/// Protocol codes for wire decode failures.
pub mod protocol_codes {
    /// Bad or unexpected header block.
    pub const HEADER: i32 = 61;
    /// Failure while transferring array data.
    pub const DATA: i32 = 62;
    /// Failure while transferring dimension data.
    pub const DIMENSION: i32 = 63;
    /// Failure in the opaque structure package.
    pub const OPAQUE: i32 = 64;
    /// Failure in a state block (client/server/request).
    pub const STATE: i32 = 65;
    /// Element type not available at the negotiated version.
    pub const VERSION: i32 = 9999;
}

/// Main error type for all uda-core operations.
#[derive(Debug, Error)]
pub enum UdaError {
    /// I/O error from the filesystem, a child process or a stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration or a plugin registry.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error (opaque object packages).
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Wire protocol violation. The code is one of [`protocol_codes`].
    #[error("Protocol error: {message}")]
    Protocol { code: i32, message: String },

    /// Neither a data object nor a source was given.
    #[error("Neither Data Object nor Source specified!")]
    MissingRequest,

    /// Malformed request syntax (parentheses, subsets, name-value pairs).
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Device substitution chain exceeded the redirect bound.
    #[error("Too many device redirections ({0})")]
    TooManyRedirects(usize),

    /// No file format could be identified for a bare path.
    #[error("No File Format identified: {0}")]
    UnrecognizedFormat(String),

    /// An MDS+ source with a tree number but no tree name.
    #[error("Ambiguous MDS+ path: {0}")]
    AmbiguousMdsPath(String),

    /// Path contains characters outside the portable file name set.
    #[error("Illegal path: {0}")]
    IllegalPath(String),

    /// Inconsistent configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Peer closed the stream.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl UdaError {
    /// Build a protocol error with the given code.
    pub fn protocol(code: i32, message: impl Into<String>) -> Self {
        UdaError::Protocol {
            code,
            message: message.into(),
        }
    }

    /// Numeric code recorded on the error stack.
    pub fn code(&self) -> i32 {
        match self {
            UdaError::Io(e) => e.raw_os_error().unwrap_or(CODE_ERROR),
            UdaError::Protocol { code, .. } => *code,
            UdaError::ConnectionClosed => protocol_codes::STATE,
            _ => CODE_ERROR,
        }
    }

    /// Stack classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            UdaError::Io(_) => ErrorKind::System,
            _ => ErrorKind::Code,
        }
    }
}

/// Result type alias using UdaError.
pub type Result<T> = std::result::Result<T, UdaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(UdaError::MissingRequest.code(), CODE_ERROR);
        assert_eq!(
            UdaError::protocol(protocol_codes::VERSION, "x").code(),
            9999
        );
        let io = std::io::Error::from_raw_os_error(2);
        assert_eq!(UdaError::from(io).code(), 2);
    }

    #[test]
    fn test_kinds() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(UdaError::from(io).kind(), ErrorKind::System);
        assert_eq!(UdaError::Syntax("x".into()).kind(), ErrorKind::Code);
    }

    #[test]
    fn test_display() {
        let err = UdaError::TooManyRedirects(10);
        assert!(err.to_string().contains("Too many device redirections"));
        assert_eq!(
            UdaError::MissingRequest.to_string(),
            "Neither Data Object nor Source specified!"
        );
    }
}
