//! Error types for the wire-protocol stack.
//!
//! Every fallible codec operation returns a typed error rather than
//! panicking: all of the failure modes below represent corrupted, replayed
//! or adversarial input on a physically lossy link, or an expected
//! transient state such as waiting for a telemetry resync. Nothing in this
//! crate terminates the owning process.
//!
//! ## Error Categories
//!
//! - **Checksum Errors**: a frame arrived with a CRC that does not match
//!   its content; the decoder resumes scanning for the next frame
//! - **Desync Errors**: an incremental telemetry frame arrived out of
//!   sequence; the caller should request a full resync upstream
//! - **Auth Errors**: an authenticated datagram failed verification and
//!   must be dropped
//! - **Schema Errors**: encoder/decoder field-table mismatch; these are
//!   programmer errors and unreachable in a correct build
//! - **Config / Source Errors**: configuration or byte-source plumbing
//!
//! ## Recovery
//!
//! ```rust
//! use buslink::LinkError;
//!
//! let error = LinkError::Desync { expected: Some(3), received: 7 };
//! if error.is_recoverable() {
//!     // drop the frame, request a full resync, keep running
//! }
//! ```

use thiserror::Error;

/// Result type alias for wire-protocol operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// Main error type for the protocol stack.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    /// A delimited frame failed checksum validation. Carries the raw
    /// content bytes for diagnostic logging.
    #[error("frame checksum mismatch: read {read:#06x}, computed {computed:#06x} ({} content bytes)", .content.len())]
    Checksum { read: u16, computed: u16, content: Vec<u8> },

    /// An incremental telemetry frame carried an unexpected sequence
    /// number. `expected` is `None` when the decoder has never seen a
    /// full frame on this link.
    #[error("telemetry sequence desync: expected {expected:?}, received {received}")]
    Desync { expected: Option<u8>, received: u8 },

    /// Authenticated-datagram verification failure.
    #[error("authentication failure: {0}")]
    Auth(#[from] AuthError),

    /// Field-table mismatch between encoder and decoder. Programmer
    /// error; treat as fatal.
    #[error("schema violation: {details}")]
    Schema { details: String },

    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The underlying byte source failed.
    #[error("byte source error")]
    Source {
        #[source]
        source: std::io::Error,
    },
}

/// Verification errors for authenticated datagrams.
///
/// Checks are applied in the order the variants are listed: length,
/// signature, timestamp window, replay.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("packet too short ({len} bytes, need at least 40)")]
    TooShort { len: usize },

    #[error("HMAC signature mismatch")]
    BadSignature,

    #[error("timestamp {timestamp} is in the past")]
    TooOld { timestamp: u64 },

    #[error("timestamp {timestamp} is in the future")]
    TooNew { timestamp: u64 },

    #[error("duplicate timestamp {timestamp} (possible replay)")]
    Replayed { timestamp: u64 },
}

impl LinkError {
    /// Whether the owning loop can keep running after this error.
    ///
    /// Checksum, desync and auth failures are part of normal operation on
    /// a lossy link; schema violations are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            LinkError::Checksum { .. } => true,
            LinkError::Desync { .. } => true,
            LinkError::Auth(_) => true,
            LinkError::Schema { .. } => false,
            LinkError::Config { .. } => false,
            LinkError::Source { .. } => false,
        }
    }

    /// Helper constructor for schema violations.
    pub fn schema_violation(details: impl Into<String>) -> Self {
        LinkError::Schema { details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        LinkError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with a source.
    pub fn config_error_with_source(
        reason: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        LinkError::Config { reason: reason.into(), source: Some(source.into()) }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Source { source: err }
    }
}
