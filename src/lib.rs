// Core mining library
pub mod chunk;
pub mod hash;
pub mod header;
pub mod mining;
pub mod progress;
pub mod target;
pub mod types;

// Re-export for convenience
pub use chunk::mine_chunk;
pub use hash::{HeaderHasher, hash_header};
pub use header::HeaderTemplate;
pub use mining::{
    BackendKind, MinerConfig, MinerExecutor, SequentialExecutor, StubExecutor,
    accelerated_mine_chunk, accelerator_available, select_executor,
};
pub use target::Target;
pub use types::{ChunkOutcome, FoundNonce, HashWords, NonceRange};

#[cfg(feature = "cpu")]
pub use mining::CpuExecutor;
