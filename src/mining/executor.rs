//! Mining executors - Backend implementations for mining

use crate::chunk;
use crate::header::HeaderTemplate;
use crate::mining::config::BackendKind;
use crate::target::Target;
use crate::types::{ChunkOutcome, NonceRange};

#[cfg(feature = "cpu")]
use crate::hash::HeaderHasher;
#[cfg(feature = "cpu")]
use crate::mining::config::MinerConfig;
#[cfg(feature = "cpu")]
use rayon::prelude::*;

/// Trait for mining execution backends.
///
/// Every implementation must return exactly what [`chunk::mine_chunk`] returns
/// for the same inputs, or [`ChunkOutcome::unavailable`] if it cannot run.
pub trait MinerExecutor: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Search `range` for the smallest offset whose hash meets `target`.
    fn mine_chunk(&self, header: &HeaderTemplate, range: NonceRange, target: &Target)
    -> ChunkOutcome;

    /// Description for logging
    fn description(&self) -> String {
        self.kind().to_string()
    }
}

/// Single-threaded reference executor
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialExecutor;

impl SequentialExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl MinerExecutor for SequentialExecutor {
    fn kind(&self) -> BackendKind {
        BackendKind::Sequential
    }

    fn mine_chunk(
        &self,
        header: &HeaderTemplate,
        range: NonceRange,
        target: &Target,
    ) -> ChunkOutcome {
        chunk::mine_chunk(header, range, target)
    }
}

/// Executor standing in for an accelerator that is not there.
///
/// Never searches: every call reports nothing found and nothing tried.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubExecutor;

impl StubExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl MinerExecutor for StubExecutor {
    fn kind(&self) -> BackendKind {
        BackendKind::Stub
    }

    fn mine_chunk(&self, _: &HeaderTemplate, _: NonceRange, _: &Target) -> ChunkOutcome {
        ChunkOutcome::unavailable()
    }
}

/// CPU-based mining executor on a dedicated rayon pool
#[cfg(feature = "cpu")]
pub struct CpuExecutor {
    pool: rayon::ThreadPool,
    min_batch: usize,
}

#[cfg(feature = "cpu")]
impl CpuExecutor {
    pub fn new(config: &MinerConfig) -> Result<Self, anyhow::Error> {
        config.validate()?;
        let threads = config.resolved_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("nonce-miner-{}", i))
            .build()?;

        tracing::debug!(threads, min_batch = config.min_batch, "CPU pool ready");

        Ok(Self {
            pool,
            min_batch: config.min_batch as usize,
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

#[cfg(feature = "cpu")]
impl MinerExecutor for CpuExecutor {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn mine_chunk(
        &self,
        header: &HeaderTemplate,
        range: NonceRange,
        target: &Target,
    ) -> ChunkOutcome {
        let tries = range.effective_tries();
        if tries == 0 {
            return ChunkOutcome::exhausted(0);
        }

        let hasher = HeaderHasher::new(header);

        // find_map_first yields the lowest matching offset no matter which
        // worker finds a match first.
        let hit = self.pool.install(|| {
            (0..tries)
                .into_par_iter()
                .with_min_len(self.min_batch)
                .find_map_first(|offset| {
                    let hash = hasher.hash_nonce(range.nonce_at(offset));
                    target.is_met_by(&hash).then_some((offset, hash))
                })
        });

        match hit {
            Some((offset, hash)) => ChunkOutcome::found(range.nonce_at(offset), hash, offset + 1),
            None => ChunkOutcome::exhausted(tries),
        }
    }

    fn description(&self) -> String {
        format!("cpu ({} threads)", self.threads())
    }
}
