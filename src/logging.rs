use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` wins when set; otherwise `verbose` picks between info and debug.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "emojipack=debug"
    } else {
        "emojipack=info"
    }
}

/// Logs go to stderr so they don't tear the progress bars on stdout.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
