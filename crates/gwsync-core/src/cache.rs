//! Multi-index catalog cache.
//!
//! [`CatalogCache`] stores one [`CacheEntry`] per known spec, product and
//! proxy. Entries are indexed by primary ID, by a case-insensitive secondary
//! key (name), by content locator and by the endpoint URLs they serve.
//!
//! All indexes sit behind a single mutex. Callers only ever receive clones of
//! entries, so readers cannot observe an index while a writer is halfway
//! through updating it.
//!
//! ## Secondary key collisions
//!
//! Secondary keys are unique per kind. When a `put` binds a key that is
//! already bound to a different ID, the last write wins: the key is rebound
//! to the new ID, a warning is logged, and the displaced ID is returned. The
//! displaced entry stays reachable by its ID.
//!
//! ## Endpoint buckets
//!
//! Each endpoint URL maps to a bucket holding at most one record per ID. A
//! lookup by endpoint returns the locator of the record with the latest
//! modification time; equal times resolve to the most recently written one.

use crate::endpoint::normalize_url;
use crate::marker::{ModMarker, changed};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{trace, warn};

/// Kind of catalog item an entry describes. IDs are unique per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    /// Specification documents.
    Spec,
    /// API products.
    Product,
    /// Deployed proxies.
    Proxy,
}

impl CatalogKind {
    /// Short label used in log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spec => "spec",
            Self::Product => "product",
            Self::Proxy => "proxy",
        }
    }
}

/// Cached view of one remote catalog item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Primary ID, unique within its kind.
    pub id: String,
    /// Human name or path, unique within its kind.
    pub secondary_key: String,
    /// Where the entry's content can be downloaded from.
    pub content_locator: String,
    /// Version marker used for change detection.
    pub marker: ModMarker,
    /// Modification time used to order entries sharing an endpoint.
    pub modified: DateTime<Utc>,
    /// Normalized URLs the entry's content is served at.
    pub endpoints: Vec<String>,
}

impl CacheEntry {
    /// Create an entry without endpoints, modified now.
    pub fn new(
        id: impl Into<String>,
        secondary_key: impl Into<String>,
        content_locator: impl Into<String>,
        marker: ModMarker,
    ) -> Self {
        Self {
            id: id.into(),
            secondary_key: secondary_key.into(),
            content_locator: content_locator.into(),
            marker,
            modified: Utc::now(),
            endpoints: Vec::new(),
        }
    }

    /// Set the modification time.
    #[must_use]
    pub const fn modified_at(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = modified;
        self
    }

    /// Set the served endpoints.
    #[must_use]
    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone)]
struct EndpointRecord {
    id: String,
    locator: String,
    modified: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Default)]
struct KindIndex {
    by_id: HashMap<String, CacheEntry>,
    by_key: HashMap<String, String>,
    by_locator: HashMap<String, String>,
    by_endpoint: HashMap<String, Vec<EndpointRecord>>,
}

impl KindIndex {
    fn unbind(&mut self, previous: &CacheEntry) {
        let key = normalize_key(&previous.secondary_key);
        if self.by_key.get(&key) == Some(&previous.id) {
            self.by_key.remove(&key);
        }
        if self.by_locator.get(&previous.content_locator) == Some(&previous.id) {
            self.by_locator.remove(&previous.content_locator);
        }
        for endpoint in &previous.endpoints {
            if let Some(bucket) = self.by_endpoint.get_mut(endpoint) {
                bucket.retain(|record| record.id != previous.id);
                if bucket.is_empty() {
                    self.by_endpoint.remove(endpoint);
                }
            }
        }
    }

    fn lookup(&self, key_or_id: &str) -> Option<&CacheEntry> {
        self.by_id.get(key_or_id).or_else(|| {
            self.by_key
                .get(&normalize_key(key_or_id))
                .and_then(|id| self.by_id.get(id))
        })
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    specs: KindIndex,
    products: KindIndex,
    proxies: KindIndex,
    seq: u64,
}

impl CacheInner {
    const fn index(&self, kind: CatalogKind) -> &KindIndex {
        match kind {
            CatalogKind::Spec => &self.specs,
            CatalogKind::Product => &self.products,
            CatalogKind::Proxy => &self.proxies,
        }
    }

    const fn index_mut(&mut self, kind: CatalogKind) -> &mut KindIndex {
        match kind {
            CatalogKind::Spec => &mut self.specs,
            CatalogKind::Product => &mut self.products,
            CatalogKind::Proxy => &mut self.proxies,
        }
    }
}

/// Shared, internally synchronized store of known catalog items.
#[derive(Debug, Default)]
pub struct CatalogCache {
    inner: Mutex<CacheInner>,
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

impl CatalogCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // Every mutation completes before the guard drops, so a poisoned
        // lock still guards consistent indexes.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite the entry for `entry.id`.
    ///
    /// Returns the ID previously bound to the entry's secondary key when that
    /// binding was taken over (last write wins).
    pub fn put(&self, kind: CatalogKind, mut entry: CacheEntry) -> Option<String> {
        entry.endpoints = entry
            .endpoints
            .iter()
            .map(|ep| normalize_url(ep))
            .collect();
        entry.endpoints.sort();
        entry.endpoints.dedup();

        let mut inner = self.lock();
        inner.seq += 1;
        let seq = inner.seq;
        let index = inner.index_mut(kind);

        if let Some(previous) = index.by_id.remove(&entry.id) {
            index.unbind(&previous);
        }

        let key = normalize_key(&entry.secondary_key);
        let displaced = match index.by_key.insert(key, entry.id.clone()) {
            Some(owner) if owner != entry.id => {
                warn!(
                    kind = kind.as_str(),
                    key = %entry.secondary_key,
                    previous_id = %owner,
                    id = %entry.id,
                    "secondary key rebound to a different id"
                );
                Some(owner)
            },
            _ => None,
        };

        index
            .by_locator
            .insert(entry.content_locator.clone(), entry.id.clone());

        for endpoint in &entry.endpoints {
            let bucket = index.by_endpoint.entry(endpoint.clone()).or_default();
            bucket.retain(|record| record.id != entry.id);
            bucket.push(EndpointRecord {
                id: entry.id.clone(),
                locator: entry.content_locator.clone(),
                modified: entry.modified,
                seq,
            });
        }

        trace!(
            kind = kind.as_str(),
            id = %entry.id,
            endpoints = entry.endpoints.len(),
            "cache entry stored"
        );
        index.by_id.insert(entry.id.clone(), entry);
        displaced
    }

    /// Look up an entry by primary ID.
    pub fn get_by_id(&self, kind: CatalogKind, id: &str) -> Option<CacheEntry> {
        self.lock().index(kind).by_id.get(id).cloned()
    }

    /// Look up an entry by secondary key, case-insensitively.
    pub fn get_by_secondary_key(&self, kind: CatalogKind, key: &str) -> Option<CacheEntry> {
        let inner = self.lock();
        let index = inner.index(kind);
        index
            .by_key
            .get(&normalize_key(key))
            .and_then(|id| index.by_id.get(id))
            .cloned()
    }

    /// Look up an entry by content locator.
    pub fn get_by_locator(&self, kind: CatalogKind, locator: &str) -> Option<CacheEntry> {
        let inner = self.lock();
        let index = inner.index(kind);
        index
            .by_locator
            .get(locator)
            .and_then(|id| index.by_id.get(id))
            .cloned()
    }

    /// Locator of the most recently modified entry registered under `url`.
    pub fn get_latest_by_endpoint(&self, kind: CatalogKind, url: &str) -> Option<String> {
        let url = normalize_url(url);
        let inner = self.lock();
        inner
            .index(kind)
            .by_endpoint
            .get(&url)?
            .iter()
            .max_by_key(|record| (record.modified, record.seq))
            .map(|record| record.locator.clone())
    }

    /// Whether `marker` differs from what is stored under `key_or_id`.
    ///
    /// The primary ID is tried first, then the secondary key. An item with
    /// no prior entry always counts as changed.
    pub fn has_changed(&self, kind: CatalogKind, key_or_id: &str, marker: &ModMarker) -> bool {
        let inner = self.lock();
        let previous = inner.index(kind).lookup(key_or_id).map(|e| &e.marker);
        changed(previous, marker)
    }

    /// Number of entries of `kind`.
    pub fn len(&self, kind: CatalogKind) -> usize {
        self.lock().index(kind).by_id.len()
    }

    /// Whether no entries of `kind` are cached.
    pub fn is_empty(&self, kind: CatalogKind) -> bool {
        self.len(kind) == 0
    }
}
