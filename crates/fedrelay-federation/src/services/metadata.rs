//! Per-federation provider-metadata cache.
//!
//! Metadata is resolved lazily on first use and then held for the lifetime
//! of the cache slot. There is no automatic expiry; `invalidate` and `seed`
//! are the manual controls. Concurrent first callers share one discovery
//! fetch through the single-flight guard.

use crate::error::FederationResult;
use crate::services::discovery::{DiscoveredMetadata, DiscoveryService};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Shared cache slot for one federation's metadata. Injected so the owner
/// chooses the persistence scope (per-registry by default).
pub type MetadataCacheSlot = Arc<RwLock<Option<DiscoveredMetadata>>>;

/// Cache-first metadata resolution for one OIDC federation.
#[derive(Clone)]
pub struct MetadataProvider {
    issuer: String,
    discovery: DiscoveryService,
    cache: MetadataCacheSlot,
    fetch_guard: Arc<Mutex<()>>,
}

impl MetadataProvider {
    /// Create a provider with its own cache slot.
    #[must_use]
    pub fn new(issuer: impl Into<String>, allow_insecure: bool) -> Self {
        Self::with_cache_slot(
            issuer,
            allow_insecure,
            Arc::new(RwLock::new(None)),
        )
    }

    /// Create a provider persisting into an injected cache slot.
    #[must_use]
    pub fn with_cache_slot(
        issuer: impl Into<String>,
        allow_insecure: bool,
        cache: MetadataCacheSlot,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            discovery: DiscoveryService::new(allow_insecure),
            cache,
            fetch_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Resolve metadata: return the held value without network access, or
    /// perform exactly one discovery fetch and persist the result.
    #[instrument(skip(self), fields(issuer = %self.issuer))]
    pub async fn get(&self) -> FederationResult<DiscoveredMetadata> {
        if let Some(meta) = self.cache.read().await.clone() {
            tracing::debug!("Metadata cache hit");
            return Ok(meta);
        }

        // Single-flight: the first caller fetches, concurrent callers wait
        // here and then find the populated slot in the double-check.
        let _flight = self.fetch_guard.lock().await;
        if let Some(meta) = self.cache.read().await.clone() {
            return Ok(meta);
        }

        tracing::debug!("Metadata cache miss, discovering");
        let meta = self.discovery.discover(&self.issuer).await?;
        *self.cache.write().await = Some(meta.clone());
        Ok(meta)
    }

    /// Seed the cache with a known-good value; subsequent `get` calls return
    /// it without any network access.
    pub async fn seed(&self, meta: DiscoveredMetadata) {
        *self.cache.write().await = Some(meta);
    }

    /// Drop the held value; the next `get` performs a fresh discovery.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
        tracing::debug!(issuer = %self.issuer, "Metadata cache invalidated");
    }

    /// Configured issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}
