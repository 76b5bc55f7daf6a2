//! Delta-compressed telemetry frames.
//!
//! A telemetry frame is either *full* (every field present, the sequence
//! counter resets) or *incremental* (a 4-bit sequence number followed by a
//! presence bit per field, with absent fields carried forward from the
//! previous state). The decoder tracks the expected sequence number; a
//! mismatch means at least one frame was lost and the carried-forward state
//! can no longer be trusted, so the decode fails without touching it.

use tracing::trace;

use crate::bits::{BitReader, BitWriter};
use crate::error::{LinkError, Result};
use crate::telemetry::schema::FieldId;
use crate::telemetry::snapshot::Snapshot;

const SEQ_MASK: u8 = 15;

/// Result of a successful delta decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaOutcome {
    /// The reconstructed state after applying the frame.
    pub snapshot: Snapshot,
    /// Whether the frame carried every field.
    pub full: bool,
}

/// Stateful decoder for delta-compressed telemetry.
#[derive(Debug, Clone)]
pub struct DeltaDecoder {
    prev: Snapshot,
    /// `None` until the first full frame arrives.
    expected_seq: Option<u8>,
}

impl DeltaDecoder {
    pub fn new() -> Self {
        DeltaDecoder {
            prev: Snapshot::new(),
            expected_seq: None,
        }
    }

    /// State carried forward into the next incremental frame.
    pub fn last(&self) -> &Snapshot {
        &self.prev
    }

    /// Decode one telemetry frame from `bits`.
    ///
    /// On a sequence mismatch the decoder state is left exactly as it was,
    /// including the expected sequence number; the caller requests a full
    /// frame and retries from there.
    pub fn decode(&mut self, bits: &mut BitReader<'_>) -> Result<DeltaOutcome> {
        let full = bits.read_bits(1) != 0;
        let next_seq = if full {
            0
        } else {
            let seq = bits.read_bits(4) as u8;
            match self.expected_seq {
                Some(expected) if expected == seq => {}
                expected => {
                    return Err(LinkError::Desync {
                        expected,
                        received: seq,
                    });
                }
            }
            (seq + 1) & SEQ_MASK
        };

        let mut snapshot = self.prev;
        for field in FieldId::ALL {
            let spec = field.spec();
            if full || bits.read_bits(1) != 0 {
                let value = if spec.signed {
                    bits.read_bits_signed(spec.bits)
                } else {
                    bits.read_bits(spec.bits) as i32
                };
                snapshot.set(field, value);
            }
        }

        trace!(full, next_seq, "decoded telemetry frame");
        self.prev = snapshot;
        self.expected_seq = Some(next_seq);
        Ok(DeltaOutcome { snapshot, full })
    }
}

impl Default for DeltaDecoder {
    fn default() -> Self {
        DeltaDecoder::new()
    }
}

/// Stateful encoder mirroring [`DeltaDecoder`].
///
/// The encoder owns the sequence counter: a full frame resets it to zero
/// and each frame advances it, so the produced stream decodes cleanly in
/// order.
#[derive(Debug, Clone)]
pub struct DeltaEncoder {
    prev: Snapshot,
    seq: u8,
}

impl DeltaEncoder {
    pub fn new() -> Self {
        DeltaEncoder {
            prev: Snapshot::new(),
            seq: 0,
        }
    }

    /// Encode `snapshot` as a full frame and reset the sequence counter.
    pub fn encode_full(&mut self, snapshot: &Snapshot, out: &mut BitWriter) {
        out.write_bits(1, 1);
        for field in FieldId::ALL {
            write_field(out, field, snapshot.get(field));
        }
        self.prev = *snapshot;
        self.seq = 0;
    }

    /// Encode `snapshot` as an incremental frame against the previous state.
    pub fn encode_incremental(&mut self, snapshot: &Snapshot, out: &mut BitWriter) {
        out.write_bits(0, 1);
        out.write_bits(u32::from(self.seq), 4);
        for field in FieldId::ALL {
            let value = snapshot.get(field);
            if value == self.prev.get(field) {
                out.write_bits(0, 1);
            } else {
                out.write_bits(1, 1);
                write_field(out, field, value);
            }
        }
        self.prev = *snapshot;
        self.seq = (self.seq + 1) & SEQ_MASK;
    }
}

impl Default for DeltaEncoder {
    fn default() -> Self {
        DeltaEncoder::new()
    }
}

fn write_field(out: &mut BitWriter, field: FieldId, value: i32) {
    let spec = field.spec();
    if spec.signed {
        out.write_bits_signed(value, spec.bits);
    } else {
        out.write_bits(value as u32, spec.bits);
    }
}
