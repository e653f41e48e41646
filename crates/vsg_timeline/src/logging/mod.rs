//! Logging setup for the timeline engine.
//!
//! The engine itself only emits `tracing` events, each message prefixed
//! with the component that produced it (`[Classifier]`, `[FrameIndex]`,
//! `[ChapterSnap]`, ...). Hosts that do not install their own subscriber
//! can call [`init_tracing`] once at startup.

mod types;

pub use types::LogLevel;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize a global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `default_level` is used.
/// Calling this twice is harmless: the second install is ignored.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .try_init();
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
