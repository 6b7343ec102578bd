use tracing_subscriber::{EnvFilter, fmt::format};

/// Install the global subscriber. Logs go to stderr so stdout stays parseable.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks debug over info.
pub fn init_log(verbose: bool) {
    let format = format::format()
        .with_level(true)
        .with_target(false)
        .compact();

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(format)
        .init();
}
