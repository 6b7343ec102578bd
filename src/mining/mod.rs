//! Mining module - Backends and backend selection
//!
//! This module provides:
//! - The `MinerExecutor` trait every backend implements
//! - Sequential, parallel CPU, stub, and (feature `gpu`) OpenCL executors
//! - The capability probe and the startup-time backend selection

pub mod config;
pub mod executor;
pub mod probe;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use config::{BackendKind, MinerConfig};
#[cfg(feature = "cpu")]
pub use executor::CpuExecutor;
pub use executor::{MinerExecutor, SequentialExecutor, StubExecutor};
pub use probe::{accelerated_mine_chunk, accelerator_available};

#[cfg(feature = "gpu")]
pub use gpu::{GpuDevice, GpuExecutor};

/// Build the executor the config asks for.
///
/// `Auto` takes the GPU when the probe finds one, then the parallel CPU
/// executor, then the sequential one. An explicit backend that this build or
/// host cannot provide is an error.
pub fn select_executor(config: &MinerConfig) -> Result<Box<dyn MinerExecutor>, anyhow::Error> {
    config.validate()?;

    let executor: Box<dyn MinerExecutor> = match config.backend {
        BackendKind::Auto => auto_executor(config)?,
        BackendKind::Gpu => gpu_executor(config)?,
        BackendKind::Cpu => cpu_executor(config)?,
        BackendKind::Sequential => Box::new(SequentialExecutor::new()),
        BackendKind::Stub => Box::new(StubExecutor::new()),
    };

    tracing::info!(
        requested = %config.backend,
        backend = %executor.description(),
        "Selected mining backend"
    );
    Ok(executor)
}

fn auto_executor(config: &MinerConfig) -> Result<Box<dyn MinerExecutor>, anyhow::Error> {
    if accelerator_available() {
        return gpu_executor(config);
    }
    if cfg!(feature = "cpu") {
        return cpu_executor(config);
    }
    Ok(Box::new(SequentialExecutor::new()))
}

#[cfg(feature = "gpu")]
fn gpu_executor(config: &MinerConfig) -> Result<Box<dyn MinerExecutor>, anyhow::Error> {
    Ok(Box::new(GpuExecutor::new(config)?))
}

#[cfg(not(feature = "gpu"))]
fn gpu_executor(_config: &MinerConfig) -> Result<Box<dyn MinerExecutor>, anyhow::Error> {
    anyhow::bail!("GPU backend not compiled in (rebuild with --features gpu)")
}

#[cfg(feature = "cpu")]
fn cpu_executor(config: &MinerConfig) -> Result<Box<dyn MinerExecutor>, anyhow::Error> {
    Ok(Box::new(CpuExecutor::new(config)?))
}

#[cfg(not(feature = "cpu"))]
fn cpu_executor(_config: &MinerConfig) -> Result<Box<dyn MinerExecutor>, anyhow::Error> {
    anyhow::bail!("CPU backend not compiled in (rebuild with --features cpu)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_sequential_and_stub() {
        let seq = select_executor(&MinerConfig::new(BackendKind::Sequential, 0)).unwrap();
        assert_eq!(seq.kind(), BackendKind::Sequential);

        let stub = select_executor(&MinerConfig::new(BackendKind::Stub, 0)).unwrap();
        assert_eq!(stub.kind(), BackendKind::Stub);
    }

    #[test]
    fn test_auto_prefers_accelerator() {
        let executor = select_executor(&MinerConfig::default()).unwrap();
        let expected = if accelerator_available() {
            BackendKind::Gpu
        } else if cfg!(feature = "cpu") {
            BackendKind::Cpu
        } else {
            BackendKind::Sequential
        };
        assert_eq!(executor.kind(), expected);
    }

    #[test]
    fn test_explicit_gpu_requires_accelerator() {
        let result = select_executor(&MinerConfig::new(BackendKind::Gpu, 0));
        assert_eq!(result.is_ok(), accelerator_available());
    }

    #[cfg(feature = "cpu")]
    #[test]
    fn test_select_cpu_uses_thread_count() {
        let executor = select_executor(&MinerConfig::new(BackendKind::Cpu, 2)).unwrap();
        assert_eq!(executor.kind(), BackendKind::Cpu);
        assert_eq!(executor.description(), "cpu (2 threads)");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MinerConfig::new(BackendKind::Sequential, 0).with_gpu_work_size(0);
        assert!(select_executor(&config).is_err());
    }
}
