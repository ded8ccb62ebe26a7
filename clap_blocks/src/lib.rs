//! Config structs shared by the CLI, one module per concern.

#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, missing_docs, clippy::todo, clippy::dbg_macro)]

pub mod api;
pub mod scylla;
