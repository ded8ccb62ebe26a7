//! HTTP ingress for the remote storage adapter.
//!
//! Owns everything between the wire and the store: Snappy decompression,
//! protobuf envelope decoding, dispatch of write/read requests, and the
//! mapping of store errors onto HTTP status codes. The store never sees
//! HTTP; only decoded message types cross the boundary.

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

pub mod http;
pub mod server;
