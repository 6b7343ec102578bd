use serde::Serialize;

/// A 256-bit digest as eight little-endian words; `[7]` is the most significant.
pub type HashWords = [u32; 8];

/// Size of the nonce space (2^32).
pub const NONCE_SPACE: u64 = 1 << 32;

/// A contiguous run of nonces assigned to one chunk call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NonceRange {
    pub start: u32,
    pub tries: u32,
}

impl NonceRange {
    pub fn new(start: u32, tries: u32) -> Self {
        Self { start, tries }
    }

    /// Number of nonces that can actually be attempted.
    ///
    /// The range never wraps: a request running past `u32::MAX` is cut at the
    /// end of the nonce space.
    pub fn effective_tries(&self) -> u32 {
        let room = NONCE_SPACE - self.start as u64;
        (self.tries as u64).min(room) as u32
    }

    /// First nonce past the attempted range.
    pub fn end_exclusive(&self) -> u64 {
        self.start as u64 + self.effective_tries() as u64
    }

    /// Nonce at `offset` within the range. Callers keep `offset < effective_tries()`.
    #[inline(always)]
    pub fn nonce_at(&self, offset: u32) -> u32 {
        debug_assert!(offset < self.effective_tries());
        self.start + offset
    }

    pub fn is_truncated(&self) -> bool {
        self.effective_tries() < self.tries
    }
}

/// A satisfying nonce together with the hash it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FoundNonce {
    pub nonce: u32,
    pub hash: HashWords,
}

/// Outcome of mining one chunk.
///
/// Either a complete match (nonce and hash) or nothing; `tried` counts the
/// nonces covered, up to and including the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkOutcome {
    pub found: Option<FoundNonce>,
    pub tried: u32,
}

impl ChunkOutcome {
    pub fn found(nonce: u32, hash: HashWords, tried: u32) -> Self {
        Self {
            found: Some(FoundNonce { nonce, hash }),
            tried,
        }
    }

    pub fn exhausted(tried: u32) -> Self {
        Self { found: None, tried }
    }

    /// Reported by a backend that could not run: nothing found, nothing tried.
    pub fn unavailable() -> Self {
        Self::exhausted(0)
    }

    pub fn is_found(&self) -> bool {
        self.found.is_some()
    }

    pub fn nonce(&self) -> Option<u32> {
        self.found.map(|f| f.nonce)
    }

    pub fn hash(&self) -> Option<HashWords> {
        self.found.map(|f| f.hash)
    }
}
