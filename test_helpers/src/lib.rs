//! Shared helpers for tests across the workspace.

#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_docs)]

use observability_deps::tracing;
use std::sync::Once;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, EnvFilter};

static LOG_SETUP: Once = Once::new();

/// Enables tracing output for tests when `RUST_LOG` is set.
///
/// Safe to call from every test; the subscriber is installed at most once per
/// process. With no `RUST_LOG` in the environment this is a no-op, so test
/// output stays quiet by default.
pub fn maybe_start_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        start_logging()
    }
}

/// Enables tracing output for tests unconditionally.
pub fn start_logging() {
    LOG_SETUP.call_once(|| {
        let _ = LogTracer::init();
        let subscriber = fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
