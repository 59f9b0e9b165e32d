//! 64-bit block checksum.
//!
//! Reflected CRC-64 over the ECMA-182 polynomial, zero seed, no final XOR.
//! These parameters are frozen: every archive already on disk was written
//! with them, so they are not a tuning knob.

use crc::{Algorithm, Crc, Digest};

pub const CRC_64_SAVE: Algorithm<u64> = Algorithm {
    width:   64,
    poly:    0x42F0_E1EB_A9EA_3693,
    init:    0,
    refin:   true,
    refout:  true,
    xorout:  0,
    check:   0x2B9C_7EE4_E278_0C8A,
    residue: 0,
};

static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_SAVE);

/// Incremental digest, for callers that feed a block in pieces.
pub struct Crc64 {
    digest: Digest<'static, u64>,
}

impl Default for Crc64 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc64 {
    pub fn new() -> Self {
        Self { digest: CRC64.digest() }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    pub fn finalize(self) -> u64 {
        self.digest.finalize()
    }
}

/// One-shot checksum of a block payload.
pub fn crc64(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}

/// Most-significant digit first, the same order error messages print.
pub fn digest_hex(digest: u64) -> String {
    hex::encode(digest.to_be_bytes())
}
