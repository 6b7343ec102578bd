mod logging;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use crossbeam_channel::RecvTimeoutError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use nonce_miner::hash::hash_to_display_hex;
use nonce_miner::header::strip_hex_prefix;
use nonce_miner::progress::{ProgressDisplay, format_hashrate, format_number, hashrate};
use nonce_miner::{
    BackendKind, ChunkOutcome, HeaderTemplate, MinerConfig, MinerExecutor, NonceRange, Target,
    accelerator_available, mine_chunk, select_executor,
};

/// Proof-of-work nonce search over block header templates
#[derive(Parser, Debug)]
#[command(name = "nonce-miner")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether an accelerator is usable and which backend auto selects
    Probe {
        #[arg(long)]
        json: bool,
    },
    /// Mine a single chunk
    Mine(MineArgs),
    /// Measure hashrate on an unsatisfiable target
    Bench(BenchArgs),
    /// Check a backend against the sequential reference on random headers
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
struct BackendArgs {
    /// auto, gpu, cpu, sequential or stub
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Number of CPU threads (default: all cores)
    #[arg(short, long)]
    threads: Option<usize>,

    /// JSON miner config; flags above override it
    #[arg(long)]
    config: Option<PathBuf>,
}

impl BackendArgs {
    fn miner_config(&self) -> Result<MinerConfig> {
        let mut config = match &self.config {
            Some(path) => MinerConfig::from_json_file(path)?,
            None => MinerConfig::default(),
        };
        if let Some(backend) = self.backend {
            config = config.with_backend(backend);
        }
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct MineArgs {
    /// Serialized 80-byte header as hex
    #[arg(long)]
    header: String,

    /// Target as 64 hex chars, most significant first
    #[arg(long, conflicts_with_all = ["bits", "zero_bits"])]
    target: Option<String>,

    /// Target in compact form, e.g. 1d00ffff (default: the header's own bits)
    #[arg(long, conflicts_with = "zero_bits")]
    bits: Option<String>,

    /// Target with this many leading zero bits
    #[arg(long)]
    zero_bits: Option<u32>,

    /// First nonce to try
    #[arg(long, default_value = "0")]
    start: u32,

    /// Number of nonces to try
    #[arg(long, default_value = "1000000")]
    tries: u32,

    #[command(flatten)]
    backend: BackendArgs,

    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct BenchArgs {
    /// Stop after this many seconds (0 = until Ctrl-C)
    #[arg(short, long, default_value = "10")]
    seconds: u64,

    /// Nonces per chunk call
    #[arg(long, default_value = "4194304")]
    chunk: u32,

    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Number of random chunks
    #[arg(long, default_value = "32")]
    chunks: u32,

    /// Nonces per chunk
    #[arg(long, default_value = "65536")]
    tries: u32,

    /// Leading zero bits of the target
    #[arg(long, default_value = "12")]
    zero_bits: u32,

    /// RNG seed (default: random)
    #[arg(long)]
    seed: Option<u64>,

    #[command(flatten)]
    backend: BackendArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_log(cli.verbose);

    match cli.command {
        Command::Probe { json } => run_probe(json),
        Command::Mine(args) => run_mine(args),
        Command::Bench(args) => run_bench(args),
        Command::Verify(args) => run_verify(args),
    }
}

#[derive(Serialize)]
struct ProbeReport {
    gpu_compiled: bool,
    accelerator_available: bool,
    auto_backend: String,
    cpu_threads: usize,
}

fn run_probe(json: bool) -> Result<()> {
    let config = MinerConfig::default();
    let report = ProbeReport {
        gpu_compiled: cfg!(feature = "gpu"),
        accelerator_available: accelerator_available(),
        auto_backend: select_executor(&config)?.description(),
        cpu_threads: config.resolved_threads(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let yes_no = |b: bool| {
        if b {
            style("yes").green().bold()
        } else {
            style("no").red()
        }
    };
    println!("{}", style("Capability probe").bold());
    println!("  GPU backend compiled: {}", yes_no(report.gpu_compiled));
    println!("  Accelerator usable:   {}", yes_no(report.accelerator_available));
    println!("  Auto backend:         {}", style(&report.auto_backend).cyan());
    println!("  CPU threads:          {}", report.cpu_threads);
    Ok(())
}

fn parse_target(args: &MineArgs, header: &HeaderTemplate) -> Result<Target> {
    if let Some(hex_target) = &args.target {
        return Target::from_hex(hex_target).context("Invalid --target");
    }
    if let Some(zero_bits) = args.zero_bits {
        return Ok(Target::from_leading_zero_bits(zero_bits));
    }
    let bits = match &args.bits {
        Some(bits) => u32::from_str_radix(strip_hex_prefix(bits.trim()), 16)
            .with_context(|| format!("Invalid --bits '{}'", bits))?,
        None => header.words()[18],
    };
    Ok(Target::from_compact(bits))
}

#[derive(Serialize)]
struct MineReport {
    backend: String,
    start: u32,
    requested: u32,
    found: bool,
    nonce: Option<u32>,
    hash: Option<String>,
    tried: u32,
    elapsed_ms: u128,
}

fn run_mine(args: MineArgs) -> Result<()> {
    let header = HeaderTemplate::from_hex(&args.header)?;
    let target = parse_target(&args, &header)?;
    let range = NonceRange::new(args.start, args.tries);
    let executor = select_executor(&args.backend.miner_config()?)?;

    if range.is_truncated() {
        tracing::warn!(
            requested = range.tries,
            effective = range.effective_tries(),
            "Range cut at the end of the nonce space"
        );
    }
    tracing::debug!(
        target_hex = %target.to_hex(),
        start = range.start,
        tries = range.tries,
        "Mining chunk"
    );

    let started = Instant::now();
    let outcome = executor.mine_chunk(&header, range, &target);
    let elapsed = started.elapsed();

    if outcome.tried == 0 && range.effective_tries() > 0 {
        tracing::warn!(
            backend = %executor.description(),
            "Backend tried nothing; it is unavailable"
        );
    }

    let report = MineReport {
        backend: executor.description(),
        start: range.start,
        requested: range.tries,
        found: outcome.is_found(),
        nonce: outcome.nonce(),
        hash: outcome.hash().map(|h| hash_to_display_hex(&h)),
        tried: outcome.tried,
        elapsed_ms: elapsed.as_millis(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Target:  {}", target.to_hex());
    println!("Backend: {}", report.backend);
    match outcome.found {
        Some(found) => {
            println!("{}", style("Found a satisfying nonce").green().bold());
            println!("  Nonce: {} ({:#010x})", found.nonce, found.nonce);
            println!("  Hash:  {}", hash_to_display_hex(&found.hash));
        }
        None => println!("{}", style("No nonce in range meets the target").yellow()),
    }
    println!(
        "  Tried: {} in {:.2?} ({})",
        format_number(outcome.tried as u64),
        elapsed,
        format_hashrate(hashrate(outcome.tried as u64, elapsed))
    );
    Ok(())
}

fn run_bench(args: BenchArgs) -> Result<()> {
    if args.chunk == 0 {
        anyhow::bail!("--chunk must be at least 1");
    }
    let executor = select_executor(&args.backend.miner_config()?)?;
    let description = executor.description();
    let budget = (args.seconds > 0).then(|| Duration::from_secs(args.seconds));

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_clone = cancel.clone();
    ctrlc::set_handler(move || {
        cancel_clone.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    let (tx, rx) = crossbeam_channel::unbounded::<ChunkOutcome>();
    let chunk = args.chunk;
    let worker = {
        let cancel = cancel.clone();
        thread::spawn(move || bench_worker(executor, chunk, cancel, tx))
    };

    let progress = ProgressDisplay::new(&description, budget);
    let started = Instant::now();
    let mut attempts = 0u64;
    let mut unavailable = false;

    loop {
        if budget.is_some_and(|b| started.elapsed() >= b) {
            cancel.store(true, Ordering::SeqCst);
        }
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(outcome) => {
                if outcome.tried == 0 {
                    unavailable = true;
                }
                attempts += outcome.tried as u64;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        progress.update(attempts);
    }

    if worker.join().is_err() {
        anyhow::bail!("Benchmark worker panicked");
    }

    if unavailable {
        progress.finish_with_message("Backend is unavailable: chunks report zero tries");
        anyhow::bail!("Backend '{}' did not search", description);
    }
    progress.finish(attempts);

    let elapsed = started.elapsed();
    println!(
        "{} {} over {:.1?} on {}",
        style("Hashrate:").bold(),
        style(format_hashrate(hashrate(attempts, elapsed))).green().bold(),
        elapsed,
        description
    );
    Ok(())
}

/// Mine back-to-back chunks of a zero header until cancelled. The time word
/// advances whenever the nonce space runs out.
fn bench_worker(
    executor: Box<dyn MinerExecutor>,
    chunk: u32,
    cancel: Arc<AtomicBool>,
    tx: crossbeam_channel::Sender<ChunkOutcome>,
) {
    let mut words = [0u32; 20];
    let mut start = 0u32;

    while !cancel.load(Ordering::Relaxed) {
        let header = HeaderTemplate::from_words(words);
        let range = NonceRange::new(start, chunk);
        let outcome = executor.mine_chunk(&header, range, &Target::ZERO);

        let tried = outcome.tried;
        if tx.send(outcome).is_err() || tried == 0 {
            return;
        }

        let next = range.end_exclusive();
        if next > u32::MAX as u64 {
            words[17] = words[17].wrapping_add(1);
            start = 0;
        } else {
            start = next as u32;
        }
    }
}

fn run_verify(args: VerifyArgs) -> Result<()> {
    let executor = select_executor(&args.backend.miner_config()?)?;
    let target = Target::from_leading_zero_bits(args.zero_bits);
    let seed = args.seed.unwrap_or_else(rand::random::<u64>);
    let mut rng = StdRng::seed_from_u64(seed);

    tracing::info!(seed, backend = %executor.description(), "Verifying against sequential reference");

    let mut found = 0u32;
    let mut mismatches = 0u32;

    for i in 0..args.chunks {
        let mut words = [0u32; 20];
        rng.fill(&mut words[..]);
        let header = HeaderTemplate::from_words(words);
        let range = NonceRange::new(rng.gen_range(0..=u32::MAX), args.tries);

        let expected = mine_chunk(&header, range, &target);
        let actual = executor.mine_chunk(&header, range, &target);

        if actual.tried == 0 && expected.tried > 0 {
            anyhow::bail!("Backend '{}' is unavailable", executor.description());
        }
        if actual != expected {
            mismatches += 1;
            tracing::error!(
                chunk = i,
                header = %header.to_hex(),
                start = range.start,
                ?expected,
                ?actual,
                "Backend disagrees with sequential reference"
            );
        }
        if expected.is_found() {
            found += 1;
        }
    }

    println!("{} chunks, {} with a match, seed {}", args.chunks, found, seed);
    if mismatches > 0 {
        println!("{}", style(format!("{} mismatches", mismatches)).red().bold());
        anyhow::bail!("Backend '{}' is not equivalent to the reference", executor.description());
    }
    println!(
        "{}",
        style(format!("{} agrees with the sequential reference", executor.description()))
            .green()
            .bold()
    );
    Ok(())
}
