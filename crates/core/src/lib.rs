//! Core types and shared functionality for larder.
//!
//! This crate provides:
//! - Versioned cache stores with SQLite backend
//! - Request classification and the caching strategies
//! - Worker lifecycle (install, activate, hand-off) and the control channel
//! - Sync hooks
//! - Unified error types and configuration

pub mod cache;
pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod request;
pub mod routing;
pub mod strategy;
pub mod sync;

pub use cache::{CacheDb, CacheStore, CacheVersion, HttpResponse, RequestKey, StoredResponse};
pub use error::Error;
pub use lifecycle::{ActivationReport, LifecycleState, Registration, Worker, WorkerSettings};
pub use request::{Network, ProxyRequest, RequestMode};
pub use routing::{Classifier, Strategy};
pub use strategy::{Resolution, StrategyExecutor};
