//! # gwsync-core
//!
//! Discovery synchronization engine for API gateway catalogs.
//!
//! The engine periodically reconciles the specs, products and proxies exposed
//! by a gateway management plane against a local cache, matches deployed
//! proxies to the spec documents that describe them, and publishes each
//! distinct version of a service description exactly once to a downstream
//! registry.
//!
//! ## Architecture
//!
//! - **Catalog Cache**: multi-index store of known specs, products and proxies
//! - **Change Detection**: marker comparison deciding when an item is handled again
//! - **Spec Resolver**: maps proxy revisions to spec documents
//! - **Pollers**: one bounded-concurrency job per remote collection
//! - **Publish Coordinator**: serialized, idempotent publish decisions
//!
//! The management plane and the downstream registry are reached through the
//! [`RemoteCatalogClient`] and [`Publisher`] traits. [`SnapshotCatalog`] and
//! [`MemoryPublisher`] are in-memory implementations for replays and tests.
//!
//! ## Quick Start
//!
//! ```rust
//! use gwsync_core::{
//!     CatalogCache, CatalogSnapshot, MemoryPublisher, Pollable, ProductPoller,
//!     PublishCoordinator, SnapshotCatalog, SpecPoller, SyncConfig,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> gwsync_core::Result<()> {
//! let config = SyncConfig::default();
//! let client = Arc::new(SnapshotCatalog::new(CatalogSnapshot::default()));
//! let cache = Arc::new(CatalogCache::new());
//! let publisher = Arc::new(MemoryPublisher::new());
//! let coordinator = Arc::new(PublishCoordinator::new(publisher, config.publish.gateway_type));
//!
//! let specs = SpecPoller::new(client.clone(), cache.clone(), config.poll.pool());
//! let products = ProductPoller::new(
//!     client,
//!     cache,
//!     coordinator,
//!     specs.first_run(),
//!     config.poll.pool(),
//! );
//!
//! assert!(!products.ready());
//! specs.execute().await?;
//! assert!(products.ready());
//! products.execute().await?;
//! # Ok(())
//! # }
//! ```

/// Multi-index catalog cache
pub mod cache;
/// Collaborator traits for the management plane and spec parsing
pub mod client;
/// Engine configuration
pub mod config;
/// Normalized service descriptions
pub mod description;
/// Endpoint URL helpers
pub mod endpoint;
/// Error types and result aliases
pub mod error;
/// Product discovery filtering
pub mod filter;
/// Change detection markers
pub mod marker;
/// Poll jobs
pub mod poller;
/// Bounded worker pool
pub mod pool;
/// Idempotent publish coordination
pub mod publish;
/// Spec resolution for proxy revisions
pub mod resolver;
/// Snapshot-backed catalog client
pub mod snapshot;
/// Remote catalog models
pub mod types;

pub use cache::{CacheEntry, CatalogCache, CatalogKind};
pub use client::{RemoteCatalogClient, SpecParser};
pub use config::{FilterConfig, PollConfig, PublishConfig, SpecsConfig, SyncConfig};
pub use description::{CredentialType, ServiceDescription, UpdateSeverity};
pub use endpoint::{EndpointDefinition, normalize_url};
pub use error::{Error, Result};
pub use filter::{DiscoveryFilter, FilterOutcome};
pub use marker::{ModMarker, changed, content_hash};
pub use poller::{FirstRunSignal, Pollable, ProductPoller, ProxyPoller, SpecPoller};
pub use pool::WorkerPool;
pub use publish::{CatalogKey, Decision, MemoryPublisher, PublishCoordinator, Publisher};
pub use resolver::{SpecResolver, SpecSource};
pub use snapshot::{CatalogSnapshot, ProxySnapshot, RevisionSnapshot, SnapshotCatalog};
pub use types::*;
