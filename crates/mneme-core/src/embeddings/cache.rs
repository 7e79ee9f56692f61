//! Thread-safe LRU cache in front of the embedder: `text → Artha`
//! (spec.md §4.C).

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use super::{Artha, Embedder, EmbeddingSource};
use crate::error::Result;

/// Default capacity, per spec.md §4.C.
pub const DEFAULT_CAPACITY: usize = 10_000;

pub struct EmbeddingCache<E: Embedder> {
    inner: E,
    cache: Mutex<LruCache<String, Artha>>,
}

impl<E: Embedder> EmbeddingCache<E> {
    pub fn new(inner: E) -> Self {
        Self::with_capacity(inner, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: E, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    pub fn ready(&self) -> bool {
        self.inner.ready()
    }

    pub fn transform(&self, text: &str) -> Result<Artha> {
        if let Some(hit) = self.cache.lock().unwrap().get(text) {
            let mut hit = hit.clone();
            hit.source = EmbeddingSource::Cached;
            return Ok(hit);
        }
        let artha = self.inner.transform(text)?;
        self.cache
            .lock()
            .unwrap()
            .put(text.to_string(), artha.clone());
        Ok(artha)
    }

    /// Partition `texts` into cached/uncached, issue one batched call
    /// for the uncached set, and return results in input order
    /// (spec.md §4.C `transform_batch`).
    pub fn transform_batch(&self, texts: &[&str]) -> Result<Vec<Artha>> {
        let mut results: Vec<Option<Artha>> = vec![None; texts.len()];
        let mut uncached_idx = Vec::new();
        let mut uncached_texts = Vec::new();

        {
            let mut cache = self.cache.lock().unwrap();
            for (i, &t) in texts.iter().enumerate() {
                if let Some(hit) = cache.get(t) {
                    let mut hit = hit.clone();
                    hit.source = EmbeddingSource::Cached;
                    results[i] = Some(hit);
                } else {
                    uncached_idx.push(i);
                    uncached_texts.push(t);
                }
            }
        }

        if !uncached_texts.is_empty() {
            let fresh = self.inner.transform_batch(&uncached_texts)?;
            let mut cache = self.cache.lock().unwrap();
            for (idx, artha) in uncached_idx.into_iter().zip(fresh.into_iter()) {
                cache.put(texts[idx].to_string(), artha.clone());
                results[idx] = Some(artha);
            }
        }

        Ok(results.into_iter().map(|r| r.unwrap()).collect())
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::NullEmbedder;

    #[test]
    fn cache_hits_do_not_reinvoke_backend() {
        let cache = EmbeddingCache::new(NullEmbedder::new(8));
        let a = cache.transform("hello").unwrap();
        assert_eq!(a.source, EmbeddingSource::Null);
        let b = cache.transform("hello").unwrap();
        assert_eq!(b.source, EmbeddingSource::Cached);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn batch_partitions_cached_and_uncached() {
        let cache = EmbeddingCache::new(NullEmbedder::new(4));
        cache.transform("a").unwrap();
        let results = cache.transform_batch(&["a", "b", "c"]).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].source, EmbeddingSource::Cached);
        assert_eq!(results[1].source, EmbeddingSource::Null);
    }
}
