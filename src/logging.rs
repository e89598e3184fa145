//! Logger setup for hosts that do not install their own.
//!
//! The crate only emits through the `log` facade. Call `init()` once at
//! startup to route those records through `env_logger`; `RUST_LOG` overrides
//! the default filter.

use env_logger::Env;

pub const DEFAULT_FILTER: &str = "dealsignal=info";

/// Install `env_logger`. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let result = env_logger::Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER))
        .format_timestamp_millis()
        .try_init();
    if result.is_ok() {
        log::debug!("Logging initialized (default filter {})", DEFAULT_FILTER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init();
        init();
        log::info!("still logging");
    }
}
