//! Frame delimiting over a shared serial byte stream.
//!
//! The serial link multiplexes delimited protocol frames with ordinary
//! terminal traffic. [`FrameDecoder`] consumes the stream incrementally:
//! bytes outside any frame are surfaced unmodified as passthrough, bytes
//! between [`STX`] and [`ETX`] accumulate into a frame, and [`ESC`] hides
//! the control byte values `0x00..=0x04` inside frame content and
//! passthrough alike.
//!
//! A completed frame carries its checksum in the final 15-bit storage word;
//! [`FrameDecoder::feed`] validates it before handing the content out. A
//! mismatch is reported as [`LinkError::Checksum`] with the raw bytes for
//! diagnostics, and the decoder resumes scanning for the next start marker.
//! Decoder state (partial frame, pending escape) persists across `feed`
//! calls, so results are identical whether the stream arrives in bulk or
//! one byte at a time.

use crate::bits::BitReader;
use crate::crc::crc16;
use crate::error::LinkError;

/// Frame start marker.
pub const STX: u8 = 0x02;
/// Frame end marker.
pub const ETX: u8 = 0x03;
/// Escape marker: the following byte had 64 added on encode.
pub const ESC: u8 = 0x04;

/// Mask applied to both the transmitted and computed checksum; the wire
/// carries the low 15 bits of the CRC in one storage word.
const CRC_MASK: u16 = 0x7FFF;

/// A validated frame extracted from the byte stream.
///
/// Owns the unescaped content bytes, including the trailing checksum word;
/// [`Frame::bits`] exposes a cursor over the payload only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    content: Vec<u8>,
}

impl Frame {
    /// Payload bytes, excluding the trailing checksum word.
    pub fn payload(&self) -> &[u8] {
        &self.content[..self.content.len() - 2]
    }

    /// Bit cursor over the payload.
    pub fn bits(&self) -> BitReader<'_> {
        BitReader::new(self.payload())
    }

    /// The transmitted checksum (low 15 bits of the firmware CRC).
    pub fn checksum(&self) -> u16 {
        let n = self.content.len();
        (u16::from(self.content[n - 2]) | (u16::from(self.content[n - 1]) << 8)) & CRC_MASK
    }
}

/// Result of one [`FrameDecoder::feed`] call.
#[derive(Debug)]
pub struct FeedOutcome {
    /// Bytes consumed from the input. Always equals the input length
    /// unless a frame completed, in which case the caller re-feeds the
    /// remainder.
    pub consumed: usize,
    /// Non-framed bytes observed in the consumed span, unmodified.
    pub passthrough: Vec<u8>,
    /// A completed frame, or the checksum error it failed with.
    pub frame: Option<Result<Frame, LinkError>>,
}

/// Incremental decoder for the delimited serial stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    in_frame: bool,
    escaped: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume bytes from the stream.
    ///
    /// Stops after at most one completed frame so the caller can handle it
    /// before the remainder of the input is processed. A repeated start
    /// marker restarts frame accumulation (partial content is discarded);
    /// an end marker outside any frame is ordinary passthrough.
    pub fn feed(&mut self, input: &[u8]) -> FeedOutcome {
        let mut passthrough = Vec::new();

        for (i, &byte) in input.iter().enumerate() {
            if self.escaped {
                self.escaped = false;
                let literal = if byte >= 64 { byte - 64 } else { byte };
                if self.in_frame {
                    self.buf.push(literal);
                } else {
                    passthrough.push(literal);
                }
                continue;
            }

            match byte {
                ESC => self.escaped = true,
                STX => {
                    // Restart on a repeated STX; any partial frame is lost.
                    self.buf.clear();
                    self.in_frame = true;
                }
                ETX if self.in_frame => {
                    self.in_frame = false;
                    let content = std::mem::take(&mut self.buf);
                    return FeedOutcome {
                        consumed: i + 1,
                        passthrough,
                        frame: Some(validate(content)),
                    };
                }
                _ => {
                    if self.in_frame {
                        self.buf.push(byte);
                    } else {
                        passthrough.push(byte);
                    }
                }
            }
        }

        FeedOutcome { consumed: input.len(), passthrough, frame: None }
    }
}

/// Check the trailing checksum word against the CRC of the preceding
/// content.
fn validate(content: Vec<u8>) -> Result<Frame, LinkError> {
    if content.len() < 2 {
        return Err(LinkError::Checksum {
            read: 0,
            computed: crc16(&content) & CRC_MASK,
            content,
        });
    }
    let n = content.len();
    let hi = content[n - 1];
    let read = (u16::from(content[n - 2]) | (u16::from(hi) << 8)) & CRC_MASK;
    let computed = crc16(&content[..n - 2]) & CRC_MASK;
    // The 16th bit of a storage word is always zero on the wire, so a
    // checksum word carrying it is corrupt regardless of the low 15 bits.
    if hi & 0x80 != 0 || read != computed {
        return Err(LinkError::Checksum { read, computed, content });
    }
    Ok(Frame { content })
}

/// Encode already bit-packed payload words into a delimited frame.
///
/// Appends the checksum word, escapes the control byte values and wraps
/// the result in STX/ETX.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let crc = crc16(payload) & CRC_MASK;
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.push(STX);
    for &b in payload.iter().chain([(crc & 0xFF) as u8, (crc >> 8) as u8].iter()) {
        if b <= ESC {
            out.push(ESC);
            out.push(b + 64);
        } else {
            out.push(b);
        }
    }
    out.push(ETX);
    out
}
