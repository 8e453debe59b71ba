//! Logging utilities

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system at `info`, or whatever `RUST_LOG` asks for
///
/// Panics if a logger is already installed.
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Initialize the logging system if no logger is installed yet
///
/// Safe to call repeatedly, e.g. from tests.
pub fn try_init() {
    let _ = env_logger::builder().is_test(cfg!(test)).try_init();
}
