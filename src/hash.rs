//! SHA-256d header hashing.

use crate::header::{HEADER_BYTES, HeaderTemplate};
use crate::types::HashWords;
use sha2::{Digest, Sha256};

/// Bytes of the header absorbed into the cached midstate.
const MIDSTATE_BYTES: usize = 64;

/// SHA256(SHA256(data)).
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Pack a digest into little-endian words.
#[inline]
pub fn digest_to_words(digest: [u8; 32]) -> HashWords {
    let mut words = [0u32; 8];
    for (word, chunk) in words.iter_mut().zip(digest.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

pub fn words_to_digest(words: &HashWords) -> [u8; 32] {
    let mut digest = [0u8; 32];
    for (chunk, word) in digest.chunks_exact_mut(4).zip(words.iter()) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    digest
}

/// Hash the header with `nonce` substituted, without any caching.
pub fn hash_header(header: &HeaderTemplate, nonce: u32) -> HashWords {
    digest_to_words(double_sha256(&header.with_nonce(nonce).to_bytes()))
}

/// Render a hash the way block explorers show it (most significant byte first).
pub fn hash_to_display_hex(hash: &HashWords) -> String {
    hash.iter().rev().map(|w| format!("{:08x}", w)).collect()
}

/// Per-template hasher that reuses the SHA-256 state after the first 64 bytes.
///
/// Only the last 16 bytes (merkle tail, time, bits, nonce) are absorbed per
/// trial. Output is identical to [`hash_header`].
#[derive(Clone)]
pub struct HeaderHasher {
    midstate: Sha256,
    tail: [u8; HEADER_BYTES - MIDSTATE_BYTES],
}

impl HeaderHasher {
    pub fn new(header: &HeaderTemplate) -> Self {
        let bytes = header.to_bytes();

        let mut midstate = Sha256::new();
        midstate.update(&bytes[..MIDSTATE_BYTES]);

        let mut tail = [0u8; HEADER_BYTES - MIDSTATE_BYTES];
        tail.copy_from_slice(&bytes[MIDSTATE_BYTES..]);

        Self { midstate, tail }
    }

    #[inline(always)]
    pub fn hash_nonce(&self, nonce: u32) -> HashWords {
        let mut tail = self.tail;
        tail[12..].copy_from_slice(&nonce.to_le_bytes());

        let mut state = self.midstate.clone();
        state.update(tail);
        let first = state.finalize();
        digest_to_words(Sha256::digest(first).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::tests::{GENESIS_HEX, GENESIS_NONCE};

    #[test]
    fn test_double_sha256() {
        let hash = double_sha256(b"hello");
        let expected =
            hex::decode("9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50")
                .unwrap();
        assert_eq!(hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_zero_header_hash() {
        let hash = hash_header(&HeaderTemplate::zeroed(), 0);
        assert_eq!(
            hash,
            [
                0x0e57e74b, 0x09eb708f, 0x46c84036, 0x75ba7482, 0xaaa74597, 0xab257d2b,
                0xb221041e, 0x14508459
            ]
        );
        assert_eq!(
            hex::encode(words_to_digest(&hash)),
            "4be7570e8f70eb093640c8468274ba759745a7aa2b7d25ab1e0421b259845014"
        );
    }

    #[test]
    fn test_genesis_hash_display() {
        let header = HeaderTemplate::from_hex(GENESIS_HEX).unwrap();
        let hash = hash_header(&header, GENESIS_NONCE);

        assert_eq!(hash[7], 0);
        assert_eq!(hash[6], 0x0019d668);
        assert_eq!(
            hash_to_display_hex(&hash),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
    }

    #[test]
    fn test_midstate_matches_plain_hash() {
        let header = HeaderTemplate::from_hex(GENESIS_HEX).unwrap();
        let hasher = HeaderHasher::new(&header);

        for nonce in [0, 1, 0xdeadbeef, GENESIS_NONCE, u32::MAX] {
            assert_eq!(
                hasher.hash_nonce(nonce),
                hash_header(&header, nonce),
                "nonce {:#010x}",
                nonce
            );
        }
    }

    #[test]
    fn test_midstate_ignores_template_nonce() {
        let header = HeaderTemplate::from_hex(GENESIS_HEX).unwrap();
        let a = HeaderHasher::new(&header);
        let b = HeaderHasher::new(&header.with_nonce(12345));
        assert_eq!(a.hash_nonce(99), b.hash_nonce(99));
    }

    #[test]
    fn test_digest_word_roundtrip() {
        let digest = double_sha256(b"words");
        assert_eq!(words_to_digest(&digest_to_words(digest)), digest);
    }
}
