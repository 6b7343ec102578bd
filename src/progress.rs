use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// Spinner showing hashrate and attempt count for a running benchmark
pub struct ProgressDisplay {
    bar: ProgressBar,
    start_time: Instant,
    budget: Option<Duration>,
}

impl ProgressDisplay {
    pub fn new(backend: &str, budget: Option<Duration>) -> Self {
        let bar = ProgressBar::new_spinner();

        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        bar.set_style(style);
        bar.set_message(format!("Hashing on {} | 0 H/s | 0 attempts", backend));

        Self {
            bar,
            start_time: Instant::now(),
            budget,
        }
    }

    pub fn update(&self, attempts: u64) {
        let elapsed = self.start_time.elapsed();
        let hashrate = hashrate(attempts, elapsed);

        let remaining = match self.budget {
            Some(budget) => format_duration(budget.saturating_sub(elapsed)),
            None => "until Ctrl-C".to_string(),
        };

        self.bar.set_message(format!(
            "{} | {} attempts | remaining: {}",
            format_hashrate(hashrate),
            format_number(attempts),
            remaining
        ));
        self.bar.tick();
    }

    pub fn finish(&self, attempts: u64) {
        let elapsed = self.start_time.elapsed();
        self.bar.finish_with_message(format!(
            "Done in {} ({} attempts, {})",
            format_duration(elapsed),
            format_number(attempts),
            format_hashrate(hashrate(attempts, elapsed))
        ));
    }

    pub fn finish_with_message(&self, msg: &str) {
        self.bar.finish_with_message(msg.to_string());
    }
}

pub fn hashrate(attempts: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { attempts as f64 / secs } else { 0.0 }
}

pub fn format_hashrate(hashrate: f64) -> String {
    if hashrate >= 1_000_000_000.0 {
        format!("{:.2} GH/s", hashrate / 1_000_000_000.0)
    } else if hashrate >= 1_000_000.0 {
        format!("{:.2} MH/s", hashrate / 1_000_000.0)
    } else if hashrate >= 1_000.0 {
        format!("{:.2} KH/s", hashrate / 1_000.0)
    } else {
        format!("{:.0} H/s", hashrate)
    }
}

pub fn format_number(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
