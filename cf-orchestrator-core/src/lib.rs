//! Cloudflare Orchestrator Core Library
//!
//! Business logic of the management console, independent of any transport:
//! - Domain snapshots and per-zone toggles (Domain Service)
//! - Rule templates and their deployment (Template Service, Rule Service)
//! - Bulk operations with streamed progress (Bulk Operation Service)
//!
//! Persistence goes through the [`KeyValueStore`] trait so the same services run
//! behind the web server, in tests, or anywhere else a store can be supplied.

pub mod cache;
pub mod classification;
pub mod config;
pub mod error;
pub mod services;
pub mod traits;
pub mod transport;
pub mod types;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test_utils;

// Re-export common types
pub use cache::CacheRepository;
pub use config::BulkConfig;
pub use error::{CoreError, CoreResult};
pub use services::{BulkOperationService, ServiceContext};
pub use tokio_util::sync::CancellationToken;
pub use traits::{InMemoryStore, KeyValueStore};
pub use transport::{encode_frame, ProgressStream, SseFrameDecoder};
