//! Client code for larder.
//!
//! This crate provides the HTTP side of the proxy: the reqwest-backed
//! [`Network`](larder_core::Network) implementation and the sync routine
//! that hands background sync off to the host application.

pub mod fetch;
pub mod sync;

pub use fetch::{FetchClient, FetchConfig};
pub use sync::EndpointSync;
