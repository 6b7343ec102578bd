//! Capability probe for the accelerated backend.
//!
//! The device is opened at most once per process. Every failure on the way
//! (no platform, no device, build error, self-check mismatch) is logged and
//! reported as "not available".

use crate::header::HeaderTemplate;
use crate::target::Target;
use crate::types::{ChunkOutcome, NonceRange};

#[cfg(feature = "gpu")]
use crate::mining::config::MinerConfig;
#[cfg(feature = "gpu")]
use crate::mining::gpu::{GpuDevice, outcome_or_unavailable};
#[cfg(feature = "gpu")]
use parking_lot::Mutex;
#[cfg(feature = "gpu")]
use std::sync::OnceLock;

#[cfg(feature = "gpu")]
static DEVICE: OnceLock<Option<Mutex<GpuDevice>>> = OnceLock::new();

/// Number of times device initialization has run in this process.
#[cfg(all(test, feature = "gpu"))]
static INIT_RUNS: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

/// The process-wide device, initializing it on first call.
#[cfg(feature = "gpu")]
pub(crate) fn shared_device() -> Option<&'static Mutex<GpuDevice>> {
    DEVICE
        .get_or_init(|| {
            #[cfg(test)]
            INIT_RUNS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            open_device()
        })
        .as_ref()
}

#[cfg(feature = "gpu")]
fn open_device() -> Option<Mutex<GpuDevice>> {
    match GpuDevice::init() {
        Ok(device) => {
            tracing::info!(device = device.name(), "Accelerator available");
            Some(Mutex::new(device))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Accelerator unavailable");
            None
        }
    }
}

/// Whether the accelerated backend is compiled in and usable on this host.
#[cfg(feature = "gpu")]
pub fn accelerator_available() -> bool {
    shared_device().is_some()
}

/// Whether the accelerated backend is compiled in and usable on this host.
#[cfg(not(feature = "gpu"))]
pub fn accelerator_available() -> bool {
    false
}

/// Mine one chunk on the accelerator.
///
/// Reports [`ChunkOutcome::unavailable`] when there is no accelerator or the
/// device fails during the chunk; callers then fall back to a CPU backend.
#[cfg(feature = "gpu")]
pub fn accelerated_mine_chunk(
    header: &HeaderTemplate,
    range: NonceRange,
    target: &Target,
) -> ChunkOutcome {
    let Some(device) = shared_device() else {
        return ChunkOutcome::unavailable();
    };
    let work_size = MinerConfig::default().gpu_work_size;
    let result = device.lock().mine_chunk(header, range, target, work_size);
    outcome_or_unavailable(result, range)
}

/// Mine one chunk on the accelerator.
///
/// Built without an accelerator, so this never searches.
#[cfg(not(feature = "gpu"))]
pub fn accelerated_mine_chunk(
    _header: &HeaderTemplate,
    _range: NonceRange,
    _target: &Target,
) -> ChunkOutcome {
    ChunkOutcome::unavailable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk;

    #[test]
    fn test_probe_is_stable() {
        let first = accelerator_available();
        for _ in 0..3 {
            assert_eq!(accelerator_available(), first);
        }
    }

    /// Repeated answers from many threads stay the same; the exactly-once
    /// init itself is counted in `test_device_init_runs_once`.
    #[test]
    fn test_concurrent_probes_agree() {
        let answers: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(accelerator_available)).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(answers.iter().all(|&a| a == answers[0]));
    }

    #[cfg(feature = "gpu")]
    #[test]
    fn test_device_init_runs_once() {
        use std::sync::atomic::Ordering;

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    shared_device();
                });
            }
        });
        accelerator_available();

        // Counts every init in this test binary, whichever test got there first.
        assert_eq!(INIT_RUNS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_accelerated_chunk_never_disagrees_with_reference() {
        let header = HeaderTemplate::zeroed();
        let range = NonceRange::new(0, 4000);
        let target = Target::from_leading_zero_bits(16);

        let outcome = accelerated_mine_chunk(&header, range, &target);
        if accelerator_available() {
            assert_eq!(outcome, chunk::mine_chunk(&header, range, &target));
        } else {
            assert_eq!(outcome, ChunkOutcome::unavailable());
        }
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn test_probe_false_without_gpu_feature() {
        assert!(!accelerator_available());
        let outcome =
            accelerated_mine_chunk(&HeaderTemplate::zeroed(), NonceRange::new(0, 1), &Target::MAX);
        assert_eq!(outcome.tried, 0);
        assert!(!outcome.is_found());
    }
}
