//! The 80-byte block header template handed to the miner.

use anyhow::Context;

/// Number of 32-bit words in a header.
pub const HEADER_WORDS: usize = 20;
/// Serialized header size in bytes.
pub const HEADER_BYTES: usize = HEADER_WORDS * 4;
/// Index of the nonce word (bytes 76..80).
pub const NONCE_WORD: usize = 19;

/// Drop a single leading `0x` or `0X`.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Header template with a variable nonce word.
///
/// Words are little-endian packings of the serialized header, i.e. exactly
/// what copying the 80 bytes into a `[u32; 20]` on a little-endian host gives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderTemplate {
    words: [u32; HEADER_WORDS],
}

impl HeaderTemplate {
    pub fn from_words(words: [u32; HEADER_WORDS]) -> Self {
        Self { words }
    }

    pub fn from_bytes(bytes: &[u8; HEADER_BYTES]) -> Self {
        let mut words = [0u32; HEADER_WORDS];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self { words }
    }

    /// Parse a serialized header given as 160 hex characters (optional `0x`).
    pub fn from_hex(hex_header: &str) -> Result<Self, anyhow::Error> {
        let hex_header = strip_hex_prefix(hex_header.trim());
        if hex_header.len() != HEADER_BYTES * 2 {
            anyhow::bail!(
                "Header must be {} hex chars, got {}",
                HEADER_BYTES * 2,
                hex_header.len()
            );
        }

        let mut bytes = [0u8; HEADER_BYTES];
        hex::decode_to_slice(hex_header, &mut bytes).context("Invalid header hex")?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn zeroed() -> Self {
        Self {
            words: [0; HEADER_WORDS],
        }
    }

    pub fn words(&self) -> &[u32; HEADER_WORDS] {
        &self.words
    }

    pub fn nonce(&self) -> u32 {
        self.words[NONCE_WORD]
    }

    /// A private copy with only the nonce word replaced.
    #[inline(always)]
    pub fn with_nonce(&self, nonce: u32) -> Self {
        let mut trial = *self;
        trial.words[NONCE_WORD] = nonce;
        trial
    }

    pub fn to_bytes(&self) -> [u8; HEADER_BYTES] {
        let mut bytes = [0u8; HEADER_BYTES];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(self.words.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl Default for HeaderTemplate {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Bitcoin genesis block header, nonce included.
    pub(crate) const GENESIS_HEX: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";
    pub(crate) const GENESIS_NONCE: u32 = 2_083_236_893;

    #[test]
    fn test_genesis_word_layout() {
        let header = HeaderTemplate::from_hex(GENESIS_HEX).unwrap();
        let words = header.words();

        assert_eq!(words[0], 1); // version
        assert_eq!(words[9], 0xfdeda33b); // first merkle root word
        assert_eq!(words[17], 0x495fab29); // time
        assert_eq!(words[18], 0x1d00ffff); // bits
        assert_eq!(header.nonce(), GENESIS_NONCE);
        assert_eq!(header.nonce(), 0x7c2bac1d);
    }

    #[test]
    fn test_bytes_roundtrip_preserves_serialization() {
        let header = HeaderTemplate::from_hex(GENESIS_HEX).unwrap();
        assert_eq!(header.to_hex(), GENESIS_HEX);
    }

    #[test]
    fn test_with_nonce_copies() {
        let header = HeaderTemplate::from_hex(GENESIS_HEX).unwrap();
        let trial = header.with_nonce(42);

        assert_eq!(trial.nonce(), 42);
        assert_eq!(header.nonce(), GENESIS_NONCE);
        assert_eq!(trial.words()[..NONCE_WORD], header.words()[..NONCE_WORD]);
        assert_eq!(&trial.to_bytes()[76..], &42u32.to_le_bytes());
    }

    #[test]
    fn test_hex_prefix_accepted() {
        let with_prefix = format!("0x{}", GENESIS_HEX);
        assert!(HeaderTemplate::from_hex(&with_prefix).is_ok());
    }

    #[test]
    fn test_strip_hex_prefix_once() {
        assert_eq!(strip_hex_prefix("0x1f"), "1f");
        assert_eq!(strip_hex_prefix("0X1f"), "1f");
        assert_eq!(strip_hex_prefix("0x0x1f"), "0x1f");
        assert_eq!(strip_hex_prefix("1f"), "1f");

        assert!(HeaderTemplate::from_hex(&format!("0X{}", GENESIS_HEX)).is_ok());
        assert!(HeaderTemplate::from_hex(&format!("0x0x{}", GENESIS_HEX)).is_err());
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(HeaderTemplate::from_hex("00").is_err());
        assert!(HeaderTemplate::from_hex(&"0".repeat(162)).is_err());
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(HeaderTemplate::from_hex(&"zz".repeat(80)).is_err());
    }
}
