//! Block and key representations shared with the register interface.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Size of one AES block in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Number of 32-bit words in one block register bank.
pub const BLOCK_WORDS: usize = BLOCK_SIZE / 4;

/// Number of 32-bit key registers (enough for a 256-bit key).
pub const KEY_WORDS: usize = 8;

/// AES block of 16 bytes.
pub type Block = [u8; BLOCK_SIZE];

/// Key lengths the control register can encode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyLength {
    /// 128-bit key.
    #[serde(rename = "128")]
    Aes128,
    /// 192-bit key.
    #[serde(rename = "192")]
    Aes192,
    /// 256-bit key.
    #[serde(rename = "256")]
    Aes256,
}

impl KeyLength {
    /// Key size in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// Number of key registers that carry key material.
    pub const fn words(self) -> usize {
        self.bytes() / 4
    }
}

impl fmt::Display for KeyLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AES-{}", self.bytes() * 8)
    }
}

/// Key material, sized by its variant.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// 128-bit key.
    Aes128([u8; 16]),
    /// 192-bit key.
    Aes192([u8; 24]),
    /// 256-bit key.
    Aes256([u8; 32]),
}

impl Key {
    /// Length of this key.
    pub const fn length(&self) -> KeyLength {
        match self {
            Self::Aes128(_) => KeyLength::Aes128,
            Self::Aes192(_) => KeyLength::Aes192,
            Self::Aes256(_) => KeyLength::Aes256,
        }
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Aes128(k) => k,
            Self::Aes192(k) => k,
            Self::Aes256(k) => k,
        }
    }

    /// Builds a key from a byte slice of 16, 24 or 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            16 => bytes.try_into().ok().map(Self::Aes128),
            24 => bytes.try_into().ok().map(Self::Aes192),
            32 => bytes.try_into().ok().map(Self::Aes256),
            _ => None,
        }
    }

    /// Key material as little-endian register words, zero padded to
    /// [`KEY_WORDS`].
    pub fn to_words(&self) -> [u32; KEY_WORDS] {
        let mut words = [0u32; KEY_WORDS];
        le_words(self.as_bytes(), &mut words);
        words
    }
}

impl From<[u8; 16]> for Key {
    fn from(value: [u8; 16]) -> Self {
        Self::Aes128(value)
    }
}

// Key material stays out of logs.
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key").field("length", &self.length()).finish_non_exhaustive()
    }
}

/// Packs `bytes` into little-endian `words`, stopping at whichever runs out
/// first. Words past the end of `bytes` are left untouched.
pub fn le_words(bytes: &[u8], words: &mut [u32]) {
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
}

/// Inverse of [`le_words`].
pub fn le_bytes(words: &[u32], bytes: &mut [u8]) {
    for (chunk, word) in bytes.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

/// Splits a block into little-endian register words.
#[inline]
pub fn block_to_words(block: &Block) -> [u32; BLOCK_WORDS] {
    let mut words = [0u32; BLOCK_WORDS];
    le_words(block, &mut words);
    words
}

/// Reassembles a block from little-endian register words.
#[inline]
pub fn words_to_block(words: &[u32; BLOCK_WORDS]) -> Block {
    let mut block = [0u8; BLOCK_SIZE];
    le_bytes(words, &mut block);
    block
}
