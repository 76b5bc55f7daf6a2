//! Frame checksum.
//!
//! Table-free CRC-16 shared with the embedded firmware. The algorithm must
//! match the firmware bit for bit; do not substitute a lookup-table CCITT
//! implementation without verifying the exact seed and shift sequence.

/// Compute the CRC-16 of `buf` with seed `0xFFFF`.
///
/// Reference vector: `crc16(b"123") == 0x5BCE`.
pub fn crc16(buf: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in buf {
        let mut x = ((crc >> 8) ^ b as u16) & 0xFF;
        x ^= x >> 4;
        crc = (crc << 8) ^ (x << 12) ^ (x << 5) ^ x;
    }
    crc
}
