//! Protobuf message types shared across the workspace.

#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::todo, clippy::dbg_macro)]

pub mod prompb;

pub use prost;
