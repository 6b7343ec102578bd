use crate::header::strip_hex_prefix;
use crate::types::HashWords;
use std::cmp::Ordering;

/// Compare two little-endian 256-bit values, most significant word first.
#[inline(always)]
pub fn compare_words(a: &[u32; 8], b: &[u32; 8]) -> Ordering {
    for i in (0..8).rev() {
        match a[i].cmp(&b[i]) {
            Ordering::Equal => continue,
            unequal => return unequal,
        }
    }
    Ordering::Equal
}

/// Proof-of-work threshold: a hash is accepted iff its value is <= the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    words: [u32; 8],
}

impl Target {
    /// Accepts every hash.
    pub const MAX: Target = Target {
        words: [u32::MAX; 8],
    };
    /// Accepts only the all-zero hash.
    pub const ZERO: Target = Target { words: [0; 8] };

    pub fn from_words(words: [u32; 8]) -> Self {
        Self { words }
    }

    pub fn words(&self) -> &[u32; 8] {
        &self.words
    }

    /// Check whether `hash` satisfies this target.
    #[inline(always)]
    pub fn is_met_by(&self, hash: &HashWords) -> bool {
        compare_words(hash, &self.words) != Ordering::Greater
    }

    /// Decode the compact "bits" encoding used in block headers.
    ///
    /// Layout is `[exponent:8][sign:1][mantissa:23]`, value is
    /// `mantissa * 256^(exponent - 3)`. A set sign bit or a zero mantissa
    /// gives `ZERO`; values wider than 256 bits saturate to `MAX`.
    pub fn from_compact(bits: u32) -> Self {
        let exponent = bits >> 24;
        let mantissa = bits & 0x007f_ffff;

        if bits & 0x0080_0000 != 0 || mantissa == 0 {
            return Self::ZERO;
        }

        if exponent <= 3 {
            let mut words = [0u32; 8];
            words[0] = mantissa >> (8 * (3 - exponent));
            return Self { words };
        }

        match shift_left(mantissa, 8 * (exponent - 3)) {
            Some(words) => Self { words },
            None => Self::MAX,
        }
    }

    /// Target with the top `zero_bits` bits clear and every other bit set.
    pub fn from_leading_zero_bits(zero_bits: u32) -> Self {
        let ones = 256u32.saturating_sub(zero_bits);
        let mut words = [0u32; 8];
        for (i, word) in words.iter_mut().enumerate() {
            let low = 32 * i as u32;
            *word = if ones >= low + 32 {
                u32::MAX
            } else if ones > low {
                (1u32 << (ones - low)) - 1
            } else {
                0
            };
        }
        Self { words }
    }

    /// Parse the big-endian display form (up to 64 hex chars, optional `0x`).
    ///
    /// Shorter input is read as a number, i.e. left-padded with zeros.
    pub fn from_hex(hex_target: &str) -> Result<Self, anyhow::Error> {
        let hex_target = strip_hex_prefix(hex_target.trim());

        if hex_target.is_empty() {
            anyhow::bail!("Target hex is empty");
        }
        if hex_target.len() > 64 {
            anyhow::bail!("Target too long: {} chars (max 64)", hex_target.len());
        }

        let padded = format!("{:0>64}", hex_target);
        let mut be_bytes = [0u8; 32];
        hex::decode_to_slice(&padded, &mut be_bytes)?;

        let mut words = [0u32; 8];
        for (i, chunk) in be_bytes.chunks_exact(4).enumerate() {
            words[7 - i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(Self { words })
    }

    pub fn to_hex(&self) -> String {
        self.words.iter().rev().map(|w| format!("{:08x}", w)).collect()
    }

    /// Average number of hashes needed for one match (about 2^256 / (target + 1)).
    pub fn expected_hashes(&self) -> f64 {
        let value = self
            .words
            .iter()
            .enumerate()
            .fold(0.0f64, |acc, (i, &w)| acc + w as f64 * 2f64.powi(32 * i as i32));
        2f64.powi(256) / (value + 1.0)
    }
}

impl PartialOrd for Target {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Target {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_words(&self.words, &other.words)
    }
}

fn shift_left(value: u32, shift: u32) -> Option<[u32; 8]> {
    let mut words = [0u32; 8];
    let word = (shift / 32) as usize;
    let wide = (value as u64) << (shift % 32);
    let (lo, hi) = (wide as u32, (wide >> 32) as u32);

    if word < 8 {
        words[word] = lo;
    } else if lo != 0 {
        return None;
    }
    if word + 1 < 8 {
        words[word + 1] = hi;
    } else if hi != 0 {
        return None;
    }
    Some(words)
}
