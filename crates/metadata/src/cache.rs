//! Process-wide publisher metadata cache
//!
//! Opening publisher metadata is expensive and the set of publishers on a
//! system is small, so every publisher is opened at most once per cache and
//! kept for the lifetime of the cache. There is no eviction.
//!
//! A publisher whose metadata cannot be opened is cached as
//! [`CachedPublisher::Unavailable`] so later lookups do not retry an open that
//! is bound to fail again.
//!
//! Uses parking_lot::Mutex; the lock is held while a missing entry is built,
//! so concurrent first lookups of the same publisher open it once.

use crate::publisher::PublisherMetadata;
use evtlog_core::LogSource;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cache shared by every session that does not bring its own
static GLOBAL_CACHE: Lazy<Arc<MetadataCache>> = Lazy::new(|| Arc::new(MetadataCache::new()));

/// One cache entry.
#[derive(Debug, Clone)]
pub enum CachedPublisher {
    /// Metadata opened successfully
    Available(Arc<PublisherMetadata>),
    /// Opening failed; formatting proceeds without metadata
    Unavailable,
}

impl CachedPublisher {
    /// The metadata, if available
    pub fn metadata(&self) -> Option<Arc<PublisherMetadata>> {
        match self {
            CachedPublisher::Available(m) => Some(Arc::clone(m)),
            CachedPublisher::Unavailable => None,
        }
    }
}

/// Publisher name -> metadata, never evicted.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: Mutex<HashMap<String, CachedPublisher>>,
}

impl MetadataCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn global() -> Arc<MetadataCache> {
        Arc::clone(&GLOBAL_CACHE)
    }

    /// Metadata of `publisher`, opening it through `source` on first use.
    ///
    /// Returns `None` when the publisher's metadata is unavailable, now or on
    /// the first lookup.
    pub fn lookup(
        &self,
        source: &Arc<dyn LogSource>,
        publisher: &str,
    ) -> Option<Arc<PublisherMetadata>> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(publisher) {
            return entry.metadata();
        }

        let entry = match PublisherMetadata::open(Arc::clone(source), publisher) {
            Ok(metadata) => {
                debug!(target: "evtlog::metadata", publisher, "cached publisher metadata");
                CachedPublisher::Available(Arc::new(metadata))
            }
            Err(e) => {
                warn!(
                    target: "evtlog::metadata",
                    publisher,
                    error = %e,
                    "publisher metadata unavailable, caching negative entry"
                );
                CachedPublisher::Unavailable
            }
        };
        let metadata = entry.metadata();
        entries.insert(publisher.to_string(), entry);
        metadata
    }

    /// The cached entry for `publisher` without opening anything.
    pub fn peek(&self, publisher: &str) -> Option<CachedPublisher> {
        self.entries.lock().get(publisher).cloned()
    }

    /// Number of cached publishers, negative entries included
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
