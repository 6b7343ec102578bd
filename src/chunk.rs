//! Single-threaded chunk search.
//! This is the reference the parallel and GPU backends must agree with.

use crate::hash::HeaderHasher;
use crate::header::HeaderTemplate;
use crate::target::Target;
use crate::types::{ChunkOutcome, NonceRange};

/// Mine a chunk of nonces in ascending order, stopping at the first match.
///
/// # Arguments
/// * `header` - Header template; its own nonce word is ignored
/// * `range` - Start nonce and number of tries (cut at the end of the nonce space)
/// * `target` - A hash is accepted iff it is <= this value
///
/// # Returns
/// * Found outcome with `tried = offset + 1` for the smallest satisfying offset
/// * Exhausted outcome with `tried = range.effective_tries()` otherwise
pub fn mine_chunk(header: &HeaderTemplate, range: NonceRange, target: &Target) -> ChunkOutcome {
    let tries = range.effective_tries();
    if tries == 0 {
        return ChunkOutcome::exhausted(0);
    }

    let hasher = HeaderHasher::new(header);
    for offset in 0..tries {
        let nonce = range.nonce_at(offset);
        let hash = hasher.hash_nonce(nonce);
        if target.is_met_by(&hash) {
            return ChunkOutcome::found(nonce, hash, offset + 1);
        }
    }
    ChunkOutcome::exhausted(tries)
}
