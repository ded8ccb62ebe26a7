//! Re-exports of the observability dependencies used across the workspace.
//!
//! Depending on `tracing` through this crate keeps the macro surface and the
//! version pin in exactly one place.

#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_docs)]

pub use tracing;
