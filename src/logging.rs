//! `env_logger` backend for the `log` facade.

use env_logger::{Builder, Env};

/// Logs at `info` unless `RUST_LOG` says otherwise.
pub fn init() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}
