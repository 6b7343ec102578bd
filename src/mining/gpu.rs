//! OpenCL backend.

use crate::hash::hash_header;
use crate::header::{HEADER_WORDS, HeaderTemplate};
use crate::mining::config::{BackendKind, MinerConfig};
use crate::mining::executor::MinerExecutor;
use crate::target::Target;
use crate::types::{ChunkOutcome, NonceRange};
use anyhow::Result;
use ocl::{Buffer, MemFlags, ProQue, enums::DeviceInfo};
use parking_lot::Mutex;

const KERNEL_SRC: &str = include_str!("kernel.cl");

/// Initial value of the result slot; any real offset is smaller.
const NO_RESULT: u32 = u32::MAX;

/// Header hashed by the self-check: the Bitcoin genesis block.
const SELF_CHECK_HEADER: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";

/// An initialized OpenCL device with its program and buffers.
pub struct GpuDevice {
    pro_que: ProQue,
    header_buf: Buffer<u32>,
    target_buf: Buffer<u32>,
    result_buf: Buffer<u32>,
    name: String,
}

impl GpuDevice {
    /// Open the first device on the default platform and verify its hashing.
    pub fn init() -> Result<Self> {
        let pro_que = ProQue::builder()
            .src(KERNEL_SRC)
            .dims(1)
            .build()
            .map_err(|e| anyhow::anyhow!("OpenCL Build Error: {}", e))?;

        let name = pro_que.device().info(DeviceInfo::Name)?.to_string();
        tracing::debug!(device = %name, "OpenCL program built");

        let header_buf = pro_que
            .buffer_builder::<u32>()
            .len(HEADER_WORDS)
            .flags(MemFlags::READ_ONLY)
            .build()?;
        let target_buf = pro_que
            .buffer_builder::<u32>()
            .len(8)
            .flags(MemFlags::READ_ONLY)
            .build()?;
        let result_buf = pro_que
            .buffer_builder::<u32>()
            .len(1)
            .flags(MemFlags::READ_WRITE)
            .build()?;

        let device = Self {
            pro_que,
            header_buf,
            target_buf,
            result_buf,
            name,
        };
        device.self_check()?;
        tracing::info!(device = %device.name, "GPU self-check passed");
        Ok(device)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hash a known header on the device and compare with the CPU path.
    fn self_check(&self) -> Result<()> {
        let header = HeaderTemplate::from_hex(SELF_CHECK_HEADER)?;
        let nonce = header.nonce();

        let out_buf = self
            .pro_que
            .buffer_builder::<u32>()
            .len(8)
            .flags(MemFlags::WRITE_ONLY)
            .build()?;
        self.header_buf.write(&header.words()[..]).enq()?;

        let verify_kernel = self
            .pro_que
            .kernel_builder("verify_sha256d")
            .arg(&self.header_buf)
            .arg(nonce)
            .arg(&out_buf)
            .build()?;

        unsafe {
            verify_kernel.enq()?;
        }

        let mut gpu_hash = vec![0u32; 8];
        out_buf.read(&mut gpu_hash).enq()?;

        let cpu_hash = hash_header(&header, nonce);
        if gpu_hash[..] != cpu_hash[..] {
            anyhow::bail!(
                "GPU SHA-256d mismatch: GPU={:08x?}, CPU={:08x?}",
                gpu_hash,
                cpu_hash
            );
        }
        Ok(())
    }

    /// Search `range` in dispatches of at most `work_size` work items.
    ///
    /// Batches run in ascending order and each reduces to its smallest
    /// matching offset, so the first batch with a result holds the answer.
    pub fn mine_chunk(
        &self,
        header: &HeaderTemplate,
        range: NonceRange,
        target: &Target,
        work_size: u32,
    ) -> Result<ChunkOutcome> {
        let tries = range.effective_tries();
        if tries == 0 {
            return Ok(ChunkOutcome::exhausted(0));
        }
        let work_size = work_size.max(1);

        self.header_buf.write(&header.words()[..]).enq()?;
        self.target_buf.write(&target.words()[..]).enq()?;

        let kernel = self
            .pro_que
            .kernel_builder("mine_chunk")
            .arg(&self.header_buf)
            .arg(&self.target_buf)
            .arg(range.start)
            .arg(0u32)
            .arg(0u32)
            .arg(&self.result_buf)
            .build()?;

        let reset = vec![NO_RESULT; 1];
        let mut result = vec![NO_RESULT; 1];
        let mut base = 0u32;

        while base < tries {
            let count = (tries - base).min(work_size);

            self.result_buf.write(&reset).enq()?;
            kernel.set_arg(3, base)?;
            kernel.set_arg(4, count)?;

            unsafe {
                kernel.cmd().global_work_size(count as usize).enq()?;
            }

            self.result_buf.read(&mut result).enq()?;

            if result[0] != NO_RESULT {
                return confirm_device_hit(header, range, target, result[0]);
            }
            base += count;
        }

        Ok(ChunkOutcome::exhausted(tries))
    }
}

/// Recompute a device-reported match on the CPU before accepting it.
fn confirm_device_hit(
    header: &HeaderTemplate,
    range: NonceRange,
    target: &Target,
    offset: u32,
) -> Result<ChunkOutcome> {
    if offset >= range.effective_tries() {
        anyhow::bail!("GPU reported offset {} outside the chunk", offset);
    }

    let nonce = range.nonce_at(offset);
    let hash = hash_header(header, nonce);
    if !target.is_met_by(&hash) {
        anyhow::bail!("GPU match at nonce {} failed CPU verification", nonce);
    }
    Ok(ChunkOutcome::found(nonce, hash, offset + 1))
}

/// Collapse a device error into the "nothing tried" outcome.
pub(crate) fn outcome_or_unavailable(
    result: Result<ChunkOutcome>,
    range: NonceRange,
) -> ChunkOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(error = %e, start = range.start, "GPU chunk failed");
            ChunkOutcome::unavailable()
        }
    }
}

/// Executor backed by the process-wide GPU device.
pub struct GpuExecutor {
    device: &'static Mutex<GpuDevice>,
    work_size: u32,
}

impl GpuExecutor {
    /// Use the shared device, initializing it on first use.
    pub fn new(config: &MinerConfig) -> Result<Self> {
        config.validate()?;
        let device = crate::mining::probe::shared_device()
            .ok_or_else(|| anyhow::anyhow!("No usable OpenCL device"))?;
        Ok(Self {
            device,
            work_size: config.gpu_work_size,
        })
    }
}

impl MinerExecutor for GpuExecutor {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn mine_chunk(
        &self,
        header: &HeaderTemplate,
        range: NonceRange,
        target: &Target,
    ) -> ChunkOutcome {
        let result = self
            .device
            .lock()
            .mine_chunk(header, range, target, self.work_size);
        outcome_or_unavailable(result, range)
    }

    fn description(&self) -> String {
        format!("gpu ({})", self.device.lock().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk;

    /// None when the host has no OpenCL device; device tests then return early.
    fn device() -> Option<&'static Mutex<GpuDevice>> {
        let device = crate::mining::probe::shared_device();
        if device.is_none() {
            println!("No OpenCL device, skipping GPU test");
        }
        device
    }

    #[test]
    fn test_device_hit_outside_chunk_rejected() {
        let header = HeaderTemplate::zeroed();
        let range = NonceRange::new(u32::MAX - 9, 100);

        assert!(confirm_device_hit(&header, range, &Target::MAX, 10).is_err());
        assert!(confirm_device_hit(&header, range, &Target::MAX, 9).is_ok());
    }

    #[test]
    fn test_device_hit_failing_cpu_check_rejected() {
        let header = HeaderTemplate::zeroed();
        let range = NonceRange::new(0, 1000);

        assert!(confirm_device_hit(&header, range, &Target::ZERO, 0).is_err());
        // Nonce 3474 of the zero header misses the 16-bit target; 3475 meets it.
        let target = Target::from_leading_zero_bits(16);
        let range = NonceRange::new(0, 4000);
        assert!(confirm_device_hit(&header, range, &target, 3474).is_err());
    }

    #[test]
    fn test_confirmed_hit_matches_reference() -> Result<()> {
        let header = HeaderTemplate::zeroed();
        let target = Target::from_leading_zero_bits(16);
        let range = NonceRange::new(0, 4000);

        let outcome = confirm_device_hit(&header, range, &target, 3475)?;
        assert_eq!(outcome, chunk::mine_chunk(&header, range, &target));
        Ok(())
    }

    #[test]
    fn test_device_error_reports_nothing_tried() {
        let range = NonceRange::new(0, 1000);
        let rejected = confirm_device_hit(&HeaderTemplate::zeroed(), range, &Target::ZERO, 0);

        let outcome = outcome_or_unavailable(rejected, range);
        assert_eq!(outcome, ChunkOutcome::unavailable());
        assert!(!outcome.is_found());
        assert_eq!(outcome.tried, 0);

        let exhausted = outcome_or_unavailable(Ok(ChunkOutcome::exhausted(1000)), range);
        assert_eq!(exhausted, ChunkOutcome::exhausted(1000));
    }

    #[test]
    fn test_gpu_self_check() -> Result<()> {
        let Some(device) = device() else {
            return Ok(());
        };
        device.lock().self_check()
    }

    #[test]
    fn test_gpu_matches_sequential() -> Result<()> {
        let Some(device) = device() else {
            return Ok(());
        };
        let device = device.lock();
        let header = HeaderTemplate::zeroed();

        for (range, target) in [
            (NonceRange::new(0, 1), Target::MAX),
            (NonceRange::new(0, 1000), Target::ZERO),
            (NonceRange::new(0, 4000), Target::from_leading_zero_bits(16)),
            (NonceRange::new(0, 3475), Target::from_leading_zero_bits(16)),
            (NonceRange::new(u32::MAX - 99, 1000), Target::ZERO),
        ] {
            // Small work size forces several dispatches per chunk.
            let gpu = device.mine_chunk(&header, range, &target, 256)?;
            assert_eq!(gpu, chunk::mine_chunk(&header, range, &target), "{:?}", range);
        }
        Ok(())
    }

    #[test]
    fn test_gpu_genesis_nonce() -> Result<()> {
        let Some(device) = device() else {
            return Ok(());
        };
        let header = HeaderTemplate::from_hex(SELF_CHECK_HEADER)?;
        let target = Target::from_compact(header.words()[18]);
        let range = NonceRange::new(header.nonce() - 500, 1000);

        let outcome = device.lock().mine_chunk(&header, range, &target, 1 << 10)?;
        assert_eq!(outcome.nonce(), Some(header.nonce()));
        assert_eq!(outcome.tried, 501);
        Ok(())
    }
}
