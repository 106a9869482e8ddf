//! Logging infrastructure for buildkick
//!
//! All components log through `tracing` macros. The subscriber installed here
//! renders them for a CI console: compact, no thread noise, colour only when
//! stdout is a terminal.

use std::io::IsTerminal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Check if colored output should be used.
///
/// Returns true only if:
/// - stdout is a terminal (TTY)
/// - NO_COLOR environment variable is not set
fn use_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Default filter directives when `RUST_LOG` is not set.
#[must_use]
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "buildkick=debug,warn"
    } else {
        "buildkick=info,warn"
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `verbose` selects debug level for
/// the buildkick crates. Calling this twice returns an error from the second
/// call and leaves the first subscriber in place.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(verbose)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_ansi(use_color())
                .with_target(verbose)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_line_number(false)
                .with_file(false)
                .compact(),
        )
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        for verbose in [false, true] {
            assert!(EnvFilter::try_new(default_directives(verbose)).is_ok());
        }
    }

    #[test]
    fn test_verbose_enables_debug() {
        assert!(default_directives(true).contains("debug"));
        assert!(!default_directives(false).contains("debug"));
    }
}
