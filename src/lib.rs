//! Wire-protocol stack for vehicle-bus telemetry links.
//!
//! Buslink decodes the byte stream from a vehicle interface board and
//! exchanges authenticated datagrams with a remote supervisor.
//!
//! # Features
//!
//! - **Delimited framing**: STX/ETX frames with byte escaping and a
//!   CRC-16 checksum, tolerant of arbitrary chunk boundaries
//! - **15-bit bit packing**: frame payloads are bit-packed into 15-bit
//!   words whose encoded bytes never collide with the frame delimiters
//! - **Delta telemetry**: full/incremental snapshots of the vehicle
//!   field table with sequence tracking and resync
//! - **Authenticated transport**: HMAC-SHA256 datagrams with freshness
//!   and replay protection
//!
//! # Quick Start
//!
//! ```rust
//! use buslink::frame::{encode_frame, FrameDecoder};
//!
//! let wire = encode_frame(b"hello");
//! let mut decoder = FrameDecoder::new();
//! let outcome = decoder.feed(&wire);
//! let frame = outcome.frame.unwrap()?;
//! assert_eq!(frame.payload(), b"hello");
//! # Ok::<(), buslink::LinkError>(())
//! ```

// Core codecs
pub mod bits;
pub mod crc;
mod error;
pub mod frame;
pub mod telemetry;

// Frame-level protocol
pub mod protocol;

// Supervisor link
pub mod auth;
pub mod clock;
pub mod report;

// Async plumbing
pub mod config;
pub mod driver;
pub mod source;

// Core exports
pub use error::{AuthError, LinkError, Result};

pub use bits::{BitReader, BitWriter};
pub use frame::{encode_frame, Frame, FrameDecoder};
pub use telemetry::{DeltaDecoder, DeltaEncoder, FieldId, Snapshot};

pub use auth::SignedChannel;
pub use clock::{ClockProbe, OffsetEstimator};
pub use config::LinkConfig;
pub use report::StatusReport;

pub use driver::{Driver, LinkChannels, LinkEvent};
pub use source::ByteSource;
