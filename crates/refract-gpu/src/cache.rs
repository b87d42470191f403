// Pipeline cache: compile each (shader, target format) pair at most once per
// successful compilation, shared across threads.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use refract_core::ShaderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineCacheKey {
    pub shader: ShaderId,
    pub format: wgpu::TextureFormat,
}

impl PipelineCacheKey {
    pub fn new(shader: ShaderId, format: wgpu::TextureFormat) -> Self {
        Self { shader, format }
    }
}

/// Snapshot of the cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

/// Map from key to shared compiled value.
///
/// Hits only take the read lock. Compilation runs with no lock held, so two
/// threads missing on the same key may both compile; the first to insert wins
/// and both callers receive that instance. Failed compilations insert nothing.
pub struct PipelineCache<P, K = PipelineCacheKey> {
    entries: RwLock<HashMap<K, Arc<P>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P, K: Eq + Hash + Copy> PipelineCache<P, K> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<P>> {
        self.entries.read().get(key).cloned()
    }

    pub fn get_or_compile<E>(
        &self,
        key: K,
        compile: impl FnOnce() -> Result<P, E>,
    ) -> Result<Arc<P>, E> {
        if let Some(hit) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let compiled = Arc::new(compile()?);
        let mut entries = self.entries.write();
        Ok(entries.entry(key).or_insert(compiled).clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len() as u64,
        }
    }
}

impl<P, K: Eq + Hash + Copy> Default for PipelineCache<P, K> {
    fn default() -> Self {
        Self::new()
    }
}
