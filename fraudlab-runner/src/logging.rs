//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the verbosity count picks the level
//! for the fraudlab crates (0 = info, 1 = debug, 2+ = trace).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter directive for a verbosity count.
pub fn default_directive(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("fraudlab_core={level},fraudlab_runner={level},fraudlab={level}")
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert!(default_directive(0).contains("fraudlab_core=info"));
        assert!(default_directive(1).contains("fraudlab_runner=debug"));
        assert!(default_directive(5).contains("fraudlab=trace"));
    }

    #[test]
    fn repeated_init_does_not_panic() {
        init(0);
        init(1);
    }
}
