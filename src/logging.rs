//! Log subscriber setup for the binary.
//!
//! Logs go to stderr. `RUST_LOG` wins when set; otherwise the level is
//! `warn`, or `debug` for this crate with `--verbose`.

use tracing_subscriber::EnvFilter;

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,studyflow=debug,studyflow_core=debug"
    } else {
        "warn"
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_crate_level() {
        assert_eq!(default_directives(false), "warn");
        assert!(default_directives(true).contains("studyflow=debug"));
        init_logging(true);
        init_logging(false);
    }
}
