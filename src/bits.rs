//! Bit-level codec over 15-bit storage words.
//!
//! Frame content on the serial link is packed into words of 15 significant
//! bits stored across two bytes (`low | high << 8`, bit 16 always zero), so
//! that the high byte of an encoded word can never collide with the frame
//! delimiter byte values. [`BitReader`] is a cursor over such a buffer;
//! [`BitWriter`] is the mirror used by encoders and tests.
//!
//! Reading past the end of the buffer yields zero bits rather than failing:
//! truncated frames decode as zero-filled tails, and downstream consumers
//! treat those as "no more data" sentinels. There is no bounds-checked
//! error path; callers track expected frame length externally via the frame
//! checksum.

/// Cursor over bit-packed frame content.
///
/// Also supports a raw-value mode ([`BitReader::from_values`]) that yields
/// pre-decoded integers instead of unpacking words, used to feed downstream
/// consumers deterministic fixtures in tests.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    cursor: Cursor<'a>,
}

#[derive(Debug, Clone)]
enum Cursor<'a> {
    Packed {
        buf: &'a [u8],
        /// Byte index of the current word; advances by 2 per word.
        word_pos: usize,
        /// Bit offset within the current word, 0..15.
        bit_pos: u32,
    },
    Raw {
        values: &'a [u32],
        pos: usize,
    },
}

impl<'a> BitReader<'a> {
    /// Cursor over a packed word buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { cursor: Cursor::Packed { buf, word_pos: 0, bit_pos: 0 } }
    }

    /// Cursor over a sequence of pre-decoded values. Each `read_bits` call
    /// consumes one value (masked to the requested width), bypassing bit
    /// packing entirely.
    pub fn from_values(values: &'a [u32]) -> Self {
        Self { cursor: Cursor::Raw { values, pos: 0 } }
    }

    /// Read the next `nbits` bits (1..=32), least-significant-bit first,
    /// advancing the cursor. Past-end reads return zero bits.
    pub fn read_bits(&mut self, nbits: u32) -> u32 {
        debug_assert!((1..=32).contains(&nbits), "field width {nbits} out of range");
        let mask: u64 = if nbits >= 32 { u64::from(u32::MAX) } else { (1u64 << nbits) - 1 };

        match &mut self.cursor {
            Cursor::Raw { values, pos } => {
                let rv = values.get(*pos).copied().unwrap_or(0);
                *pos += 1;
                (u64::from(rv) & mask) as u32
            }
            Cursor::Packed { buf, word_pos, bit_pos } => {
                let word = |wp: usize| -> u64 {
                    if wp >= buf.len() {
                        return 0;
                    }
                    let lo = u64::from(buf[wp]);
                    let hi = u64::from(buf.get(wp + 1).copied().unwrap_or(0));
                    lo | (hi << 8)
                };

                if *word_pos >= buf.len() {
                    return 0;
                }

                let mut wpos = *word_pos;
                let mut rv = word(wpos) >> *bit_pos;
                let mut bits_copied = 15 - *bit_pos;

                if *bit_pos + nbits < 15 {
                    *bit_pos += nbits;
                    return (rv & mask) as u32;
                }

                let mut remaining = nbits as i64 - i64::from(bits_copied);
                while remaining > 0 {
                    wpos += 2;
                    rv |= word(wpos) << bits_copied;
                    bits_copied += 15;
                    remaining -= 15;
                }

                if remaining == 0 {
                    *bit_pos = 0;
                    *word_pos = wpos + 2;
                } else {
                    *bit_pos = (remaining + 15) as u32;
                    *word_pos = wpos;
                }
                (rv & mask) as u32
            }
        }
    }

    /// Read `nbits` bits and sign-extend from the top bit
    /// (two's-complement).
    pub fn read_bits_signed(&mut self, nbits: u32) -> i32 {
        let rv = self.read_bits(nbits);
        if nbits < 32 && (rv & (1 << (nbits - 1))) != 0 {
            (i64::from(rv) - (1i64 << nbits)) as i32
        } else {
            rv as i32
        }
    }
}

/// Encoder mirror of [`BitReader`]: packs fields LSB-first into 15-bit
/// storage words.
#[derive(Debug, Default)]
pub struct BitWriter {
    words: Vec<u16>,
    /// Bit offset within the last word, 0..15. Zero means the next write
    /// starts a fresh word.
    bit_pos: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `nbits` bits of `value` (1..=32).
    pub fn write_bits(&mut self, value: u32, nbits: u32) {
        debug_assert!((1..=32).contains(&nbits), "field width {nbits} out of range");
        let mask: u64 = if nbits >= 32 { u64::from(u32::MAX) } else { (1u64 << nbits) - 1 };
        let mut v = u64::from(value) & mask;
        let mut n = nbits;

        while n > 0 {
            if self.bit_pos == 0 {
                self.words.push(0);
            }
            let idx = self.words.len() - 1;
            let space = 15 - self.bit_pos;
            let take = space.min(n);
            let chunk = (v & ((1u64 << take) - 1)) as u16;
            self.words[idx] |= chunk << self.bit_pos;
            v >>= take;
            n -= take;
            self.bit_pos += take;
            if self.bit_pos == 15 {
                self.bit_pos = 0;
            }
        }
    }

    /// Append `value` two's-complement encoded in `nbits` bits.
    pub fn write_bits_signed(&mut self, value: i32, nbits: u32) {
        self.write_bits(value as u32, nbits);
    }

    /// Number of words written so far (including a trailing partial word).
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Emit the packed bytes: each word as `low, high` with the high byte
    /// always <= 0x7F. A trailing partial word is zero-padded.
    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.words.len() * 2);
        for w in self.words {
            out.push((w & 0xFF) as u8);
            out.push((w >> 8) as u8);
        }
        out
    }
}
