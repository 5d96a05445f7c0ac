//! MCP tool implementations.
//!
//! This module contains all tools exposed by the larder server.

pub mod control;
pub mod proxy_fetch;
pub mod session;
pub mod sync;

pub use control::ControlParams;
pub use proxy_fetch::{ProxyFetchOutput, ProxyFetchParams};
pub use session::{SessionCloseParams, SessionOutput};
pub use sync::SyncParams;
