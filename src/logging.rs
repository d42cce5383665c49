use std::io::{self, IsTerminal};

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "YG_LOG";

/// Default directive for the CLI flags: `off`, `debug` or `warn`.
pub fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "off"
    } else if verbose {
        "debug"
    } else {
        "warn"
    }
}

/// Installs a stderr `fmt` subscriber; `YG_LOG` overrides the flags unless `quiet`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(verbose: bool, quiet: bool) {
    let directive = default_directive(verbose, quiet);
    let filter = if quiet {
        EnvFilter::new(directive)
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(directive))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::default_directive;

    #[test]
    fn quiet_wins_over_verbose() {
        assert_eq!(default_directive(true, true), "off");
        assert_eq!(default_directive(true, false), "debug");
        assert_eq!(default_directive(false, false), "warn");
    }
}
