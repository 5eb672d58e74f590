//! Checksum algorithms used for `HEAD_CKSUM` and `PAYLOAD_CKSUM`.
//!
//! Each algorithm is implemented as a byte-at-a-time, table-free accumulator
//! in the style of `min-rs`'s `Crc32Context` — no lookup tables, so no extra
//! static storage per checksum kind.

/// Which checksum algorithm a link uses.
///
/// Both peers on a link must agree on this. `None` disables integrity
/// checking entirely (zero-width checksum fields on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumKind {
    /// No checksum. `HEAD_CKSUM`/`PAYLOAD_CKSUM` are absent from the wire.
    None,
    /// Bitwise XOR of all bytes, complemented.
    Xor8,
    /// CRC-16/ARC: poly 0x8005 (reflected 0xA001), init 0, reflected in/out, no final XOR.
    Crc16,
    /// CRC-32/ISO-HDLC: poly 0xEDB88320, init 0xFFFFFFFF, reflected in/out, final XOR 0xFFFFFFFF.
    Crc32,
}

impl ChecksumKind {
    /// Width of the checksum field on the wire, in bytes.
    pub const fn width(self) -> usize {
        match self {
            ChecksumKind::None => 0,
            ChecksumKind::Xor8 => 1,
            ChecksumKind::Crc16 => 2,
            ChecksumKind::Crc32 => 4,
        }
    }
}

/// Accumulates a running checksum over a byte stream, one byte at a time.
#[derive(Debug, Clone, Copy)]
pub struct ChecksumAccumulator {
    kind: ChecksumKind,
    xor: u8,
    crc: u32,
}

impl ChecksumAccumulator {
    /// Starts a new accumulator for the given checksum kind.
    pub fn new(kind: ChecksumKind) -> Self {
        let crc = match kind {
            ChecksumKind::Crc32 => 0xFFFF_FFFF,
            _ => 0,
        };
        ChecksumAccumulator {
            kind,
            xor: 0xFF,
            crc,
        }
    }

    /// Folds one more byte into the running checksum.
    pub fn update(&mut self, byte: u8) {
        match self.kind {
            ChecksumKind::None => {}
            ChecksumKind::Xor8 => self.xor ^= byte,
            ChecksumKind::Crc16 => {
                self.crc ^= byte as u32;
                for _ in 0..8 {
                    if self.crc & 1 != 0 {
                        self.crc = (self.crc >> 1) ^ 0xA001;
                    } else {
                        self.crc >>= 1;
                    }
                }
            }
            ChecksumKind::Crc32 => {
                self.crc ^= byte as u32;
                for _ in 0..8 {
                    if self.crc & 1 != 0 {
                        self.crc = (self.crc >> 1) ^ 0xEDB8_8320;
                    } else {
                        self.crc >>= 1;
                    }
                }
            }
        }
    }

    /// Finalizes the accumulator, returning the checksum value. Only the
    /// low `kind.width() * 8` bits are meaningful.
    pub fn finish(self) -> u32 {
        match self.kind {
            ChecksumKind::None => 0,
            ChecksumKind::Xor8 => self.xor as u32,
            ChecksumKind::Crc16 => self.crc & 0xFFFF,
            ChecksumKind::Crc32 => !self.crc,
        }
    }
}

/// Computes the checksum of a complete byte slice in one call. Used by
/// tests and by callers who already have the bytes contiguous; the engine
/// itself uses [`ChecksumAccumulator`] incrementally.
pub fn checksum(kind: ChecksumKind, bytes: &[u8]) -> u32 {
    let mut acc = ChecksumAccumulator::new(kind);
    for &b in bytes {
        acc.update(b);
    }
    acc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor8_of_empty_is_complement_of_zero() {
        // NOT(XOR of no bytes) == NOT(0) == 0xFF.
        assert_eq!(checksum(ChecksumKind::Xor8, &[]), 0xFF);
    }

    #[test]
    fn xor8_single_byte() {
        // xor of [0xAA] is 0xAA, complemented is 0x55.
        assert_eq!(checksum(ChecksumKind::Xor8, &[0xAA]), 0x55);
    }

    #[test]
    fn crc16_of_empty_is_zero() {
        assert_eq!(checksum(ChecksumKind::Crc16, &[]), 0x0000);
    }

    #[test]
    fn crc16_known_vector() {
        // CRC-16/ARC of ASCII "123456789" is 0xBB3D.
        assert_eq!(checksum(ChecksumKind::Crc16, b"123456789"), 0xBB3D);
    }

    #[test]
    fn crc32_known_vector() {
        // CRC-32/ISO-HDLC of ASCII "123456789" is 0xCBF43926.
        assert_eq!(checksum(ChecksumKind::Crc32, b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn none_is_always_zero_width() {
        assert_eq!(ChecksumKind::None.width(), 0);
        assert_eq!(checksum(ChecksumKind::None, b"anything"), 0);
    }

    #[test]
    fn single_bit_flip_changes_crc16() {
        let original = checksum(ChecksumKind::Crc16, &[0x01, 0x02, 0x03]);
        let flipped = checksum(ChecksumKind::Crc16, &[0x01, 0x02, 0x02]);
        assert_ne!(original, flipped);
    }

    #[test]
    fn single_bit_flip_changes_crc32() {
        let original = checksum(ChecksumKind::Crc32, &[0xDE, 0xAD, 0xBE, 0xEF]);
        let flipped = checksum(ChecksumKind::Crc32, &[0xDE, 0xAD, 0xBE, 0xEE]);
        assert_ne!(original, flipped);
    }
}
