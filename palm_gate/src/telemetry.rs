//! Logging setup.
//!
//! Human-readable lines on stderr by default; JSON lines appended to a file
//! with `--log-file`.  `RUST_LOG` overrides the level either way.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Install the global subscriber.  Later calls are no-ops.
pub fn init_tracing(verbose: bool, log_file: Option<&Path>) -> io::Result<()> {
    let mut result = Ok(());
    TRACING_INIT.get_or_init(|| {
        result = install(verbose, log_file);
    });
    result
}

fn install(verbose: bool, log_file: Option<&Path>) -> io::Result<()> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_env_filter(env_filter(verbose))
                .with_writer(Mutex::new(file))
                .with_current_span(false)
                .with_span_list(false)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        None => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(env_filter(verbose))
                .with_writer(io::stderr)
                .with_target(false)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_flag_picks_debug() {
        assert_eq!(default_directive(true), "debug");
        assert_eq!(default_directive(false), "info");
    }

    #[test]
    fn init_is_idempotent() {
        let path = std::env::temp_dir().join(format!("palm-gate-trace-{}.jsonl", std::process::id()));
        init_tracing(false, Some(&path)).unwrap();
        init_tracing(true, None).unwrap();
        tracing::info!("written once");
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }
}
