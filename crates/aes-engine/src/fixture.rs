//! Known-answer fixtures and byte-exact verification.

use thiserror::Error;

use crate::block::{Block, Key, BLOCK_SIZE};
use crate::config::Operation;

/// A key plus ordered input and expected output blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VectorFixture {
    /// Label for reports.
    pub name: &'static str,
    /// Direction the expected blocks were produced with.
    pub operation: Operation,
    /// Key.
    pub key: Key,
    /// Blocks fed to the engine.
    pub input: Vec<Block>,
    /// Blocks the engine must produce.
    pub expected: Vec<Block>,
}

impl VectorFixture {
    /// The same vectors run the other way.
    pub fn inverse(&self, name: &'static str) -> Self {
        Self {
            name,
            operation: self.operation.inverse(),
            key: self.key,
            input: self.expected.clone(),
            expected: self.input.clone(),
        }
    }

    /// Checks `actual` against the expected blocks.
    pub fn verify(&self, actual: &[Block]) -> Result<(), VerificationMismatch> {
        verify(&self.expected, actual)
    }
}

/// First difference between an expected and an actual block sequence.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("mismatch at byte {offset} (block {block}, byte {byte}): expected {expected:#04x}, got {actual:?}")]
pub struct VerificationMismatch {
    /// Offset into the concatenated block sequence.
    pub offset: usize,
    /// Block index.
    pub block: usize,
    /// Byte index within the block.
    pub byte: usize,
    /// Expected byte.
    pub expected: u8,
    /// Actual byte, or `None` if the actual sequence ended early.
    pub actual: Option<u8>,
}

/// Compares two block sequences byte by byte.
///
/// Extra actual blocks beyond the expected ones are ignored.
pub fn verify(expected: &[Block], actual: &[Block]) -> Result<(), VerificationMismatch> {
    let mut actual_bytes = actual.iter().flatten().copied();
    for (offset, &want) in expected.iter().flatten().enumerate() {
        let got = actual_bytes.next();
        if got != Some(want) {
            return Err(VerificationMismatch {
                offset,
                block: offset / BLOCK_SIZE,
                byte: offset % BLOCK_SIZE,
                expected: want,
                actual: got,
            });
        }
    }
    Ok(())
}

/// NIST SP 800-38A, F.1.1 key.
pub const SP800_38A_KEY: [u8; 16] = [
    0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f, 0x3c,
];

/// NIST SP 800-38A, F.1.1 plaintext blocks 1-4.
pub const SP800_38A_PLAINTEXT: [Block; 4] = [
    [
        0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17,
        0x2a,
    ],
    [
        0xae, 0x2d, 0x8a, 0x57, 0x1e, 0x03, 0xac, 0x9c, 0x9e, 0xb7, 0x6f, 0xac, 0x45, 0xaf, 0x8e,
        0x51,
    ],
    [
        0x30, 0xc8, 0x1c, 0x46, 0xa3, 0x5c, 0xe4, 0x11, 0xe5, 0xfb, 0xc1, 0x19, 0x1a, 0x0a, 0x52,
        0xef,
    ],
    [
        0xf6, 0x9f, 0x24, 0x45, 0xdf, 0x4f, 0x9b, 0x17, 0xad, 0x2b, 0x41, 0x7b, 0xe6, 0x6c, 0x37,
        0x10,
    ],
];

/// NIST SP 800-38A, F.1.1 ciphertext blocks 1-4.
pub const SP800_38A_CIPHERTEXT: [Block; 4] = [
    [
        0x3a, 0xd7, 0x7b, 0xb4, 0x0d, 0x7a, 0x36, 0x60, 0xa8, 0x9e, 0xca, 0xf3, 0x24, 0x66, 0xef,
        0x97,
    ],
    [
        0xf5, 0xd3, 0xd5, 0x85, 0x03, 0xb9, 0x69, 0x9d, 0xe7, 0x85, 0x89, 0x5a, 0x96, 0xfd, 0xba,
        0xaf,
    ],
    [
        0x43, 0xb1, 0xcd, 0x7f, 0x59, 0x8e, 0xce, 0x23, 0x88, 0x1b, 0x00, 0xe3, 0xed, 0x03, 0x06,
        0x88,
    ],
    [
        0x7b, 0x0c, 0x78, 0x5e, 0x27, 0xe8, 0xad, 0x3f, 0x82, 0x23, 0x20, 0x71, 0x04, 0x72, 0x5d,
        0xd4,
    ],
];

/// ECB-AES128.Encrypt (F.1.1).
pub fn ecb_aes128_encrypt() -> VectorFixture {
    VectorFixture {
        name: "F.1.1 ECB-AES128.Encrypt",
        operation: Operation::Encrypt,
        key: Key::from(SP800_38A_KEY),
        input: SP800_38A_PLAINTEXT.to_vec(),
        expected: SP800_38A_CIPHERTEXT.to_vec(),
    }
}

/// ECB-AES128.Decrypt (F.1.2).
pub fn ecb_aes128_decrypt() -> VectorFixture {
    ecb_aes128_encrypt().inverse("F.1.2 ECB-AES128.Decrypt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_sequences_verify() {
        let fx = ecb_aes128_encrypt();
        assert_eq!(fx.verify(&SP800_38A_CIPHERTEXT), Ok(()));
    }

    #[test]
    fn reports_global_offset_of_first_bad_byte() {
        let fx = ecb_aes128_encrypt();
        let mut actual = fx.expected.clone();
        actual[2][5] ^= 0x01;
        actual[3][0] ^= 0x01;
        let err = fx.verify(&actual).unwrap_err();
        assert_eq!(err.offset, 2 * 16 + 5);
        assert_eq!((err.block, err.byte), (2, 5));
        assert_eq!(err.expected, SP800_38A_CIPHERTEXT[2][5]);
        assert_eq!(err.actual, Some(SP800_38A_CIPHERTEXT[2][5] ^ 0x01));
    }

    #[test]
    fn short_output_fails_at_first_missing_byte() {
        let err = verify(&SP800_38A_CIPHERTEXT, &SP800_38A_CIPHERTEXT[..3]).unwrap_err();
        assert_eq!(err.offset, 48);
        assert_eq!(err.actual, None);
    }

    #[test]
    fn decrypt_fixture_is_the_inverse() {
        let dec = ecb_aes128_decrypt();
        assert_eq!(dec.operation, Operation::Decrypt);
        assert_eq!(dec.input[0], SP800_38A_CIPHERTEXT[0]);
        assert_eq!(dec.expected[3], SP800_38A_PLAINTEXT[3]);
    }
}
