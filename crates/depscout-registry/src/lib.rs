//! Package registry access for depscout
//!
//! Provides the typed registry metadata model, a mockable registry client
//! trait with an npm HTTP implementation, and a cache-first wrapper.
//!
//! ## Features
//!
//! - **Trait-based design**: every lookup goes through `RegistryClient`
//! - **Configurable**: base URL, timeouts, retries, proxy, user-agent
//! - **Retry logic**: exponential backoff for transient failures only
//! - **Caching**: `CachedRegistry` memoises definitive answers, negative ones included

pub mod cached;
pub mod client;
pub mod config;
pub mod error;
pub mod metadata;
pub mod retry;

pub use cached::{CachedRegistry, RegistryCacheStats};
pub use client::{shared_registry, NpmRegistry, RegistryClient};
pub use config::{RegistryConfig, DEFAULT_REGISTRY_URL};
pub use error::{RegistryError, Result};
pub use metadata::{PackageMetadata, PeerRanges, VersionDetail};
pub use retry::RetryPolicy;
