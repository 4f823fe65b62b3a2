//! Error types for the proxy data path
//!
//! One variant per failure class, so close sites can tell protocol
//! violations (log at warn, the peer is misbehaving) from ordinary
//! transport noise (log at debug, peers disconnect all the time).
//! Nothing is recovered at frame level: any error on a connection pair's
//! data path tears the pair down.

use thiserror::Error;

/// Errors raised while proxying a connection pair or starting the listener.
#[derive(Error, Debug)]
pub enum RelayError {
    // ===== Transport =====
    /// IO error on either leg of a connection pair
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ===== Framing =====
    /// The 4-byte length prefix was negative
    #[error("invalid frame length: {0}")]
    InvalidFrameLength(i32),

    /// The length prefix exceeded the configured maximum
    #[error("frame length {length} exceeds maximum {max}")]
    FrameTooLarge { length: usize, max: usize },

    /// A frame window ended before a required field
    #[error("frame too short: needed {needed} bytes for {context}, had {available}")]
    FrameTooShort {
        context: &'static str,
        needed: usize,
        available: usize,
    },

    /// A varint still had its continuation bit set at the maximum width
    #[error("malformed varint: continuation bit set after {max_bytes} bytes")]
    MalformedVarint { max_bytes: usize },

    /// Bytes were left in the frame window after a structured decode
    #[error("{0} trailing bytes after structured decode")]
    TrailingBytes(usize),

    /// Error from the schema library while decoding or encoding a message
    #[error("protocol codec error: {0}")]
    Codec(#[source] anyhow::Error),

    // ===== Correlation =====
    /// A response arrived for a correlation id we never forwarded
    #[error("response correlation id {0} matches no in-flight request")]
    UnknownCorrelation(i32),

    /// A request reused a correlation id that is still in flight
    #[error("correlation id {0} is already in flight")]
    DuplicateCorrelation(i32),

    // ===== Interceptors =====
    /// A handler in the interceptor chain failed
    #[error("interceptor error: {0}")]
    Interceptor(String),

    // ===== Configuration =====
    /// Invalid configuration value, fatal at startup
    #[error("invalid configuration '{key}': {message}")]
    InvalidConfig { key: String, message: String },
}

impl RelayError {
    /// Wrap a schema-library codec error.
    pub fn codec(err: impl Into<anyhow::Error>) -> Self {
        RelayError::Codec(err.into())
    }

    /// Create an invalid configuration error with context.
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        RelayError::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors that indicate a misbehaving peer rather
    /// than ordinary transport failure.
    ///
    /// Protocol violations are logged at warning level when a pair is
    /// closed; plain disconnects and resets stay at debug level.
    pub fn is_protocol_violation(&self) -> bool {
        !matches!(self, RelayError::Io(_))
    }
}

/// Result type alias for proxy operations
pub type Result<T> = std::result::Result<T, RelayError>;
