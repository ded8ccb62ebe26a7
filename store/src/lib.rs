//! Persistence core of the remote storage adapter: translates labelled
//! Prometheus series into per-metric-family ScyllaDB tables, evolving the
//! schema on demand, and moves samples in and out of them.
//!
//! The entry point is [`SeriesStore`], generic over a [`interface::Database`]
//! backend: [`crate::scylla::ScyllaDatabase`] against a real cluster, or
//! [`mem::MemDatabase`] for tests.

#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr,
    clippy::todo,
    clippy::dbg_macro
)]

pub mod cache;
mod cql;
pub mod interface;
pub mod mem;
pub mod results;
pub mod scylla;
mod store;

pub use crate::store::{Error, SeriesStore};
