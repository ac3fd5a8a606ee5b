//! Diagnostic logging for the binary.
//!
//! Logs go to stderr through `tracing-subscriber`; user-facing output is
//! printed separately by [`crate::ui`].

use tracing_subscriber::EnvFilter;

/// Filter precedence: `-q`, then `-v`/`-vv`, then `RUST_LOG`, then `default_level`
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    if verbose > 0 {
        let level = match verbose {
            1 => "debug",
            _ => "trace",
        };
        return EnvFilter::new(level);
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber; a second call is a no-op
pub fn init(quiet: bool, verbose: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(quiet, verbose, "warn"))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
