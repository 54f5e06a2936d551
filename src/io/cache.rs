use crate::core::geometry::SubSwathGeometry;
use crate::core::merge::TileSource;
use crate::types::{BandIdentity, SarCInt16Image, SarError, SarRealImage, SarResult, TileRect};
use lru::LruCache;
use std::sync::Mutex;

const DEFAULT_CAPACITY_BYTES: usize = 256 * 1024 * 1024;

/// Key for cached source blocks
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct BlockKey {
    subswath: usize,
    band: BandIdentity,
    rect: TileRect,
}

#[derive(Clone)]
enum Block {
    Complex(SarCInt16Image),
    Real(SarRealImage),
}

struct CacheEntry {
    block: Block,
    size_bytes: usize,
}

/// Byte-bounded LRU of source blocks
struct BlockCache {
    current_bytes: usize,
    capacity_bytes: usize,
    entries: LruCache<BlockKey, CacheEntry>,
}

impl BlockCache {
    fn new(capacity_bytes: usize) -> Self {
        BlockCache {
            current_bytes: 0,
            capacity_bytes,
            entries: LruCache::unbounded(),
        }
    }

    fn get(&mut self, key: &BlockKey) -> Option<Block> {
        self.entries.get(key).map(|entry| entry.block.clone())
    }

    fn insert(&mut self, key: BlockKey, block: Block, size_bytes: usize) {
        if size_bytes > self.capacity_bytes {
            return;
        }

        if let Some(old) = self.entries.pop(&key) {
            self.current_bytes = self.current_bytes.saturating_sub(old.size_bytes);
        }

        while self.current_bytes + size_bytes > self.capacity_bytes {
            match self.entries.pop_lru() {
                Some((_key, entry)) => self.current_bytes = self.current_bytes.saturating_sub(entry.size_bytes),
                None => break,
            }
        }

        self.current_bytes = self.current_bytes.saturating_add(size_bytes);
        self.entries.put(key, CacheEntry { block, size_bytes });
    }
}

/// Tile source wrapper that keeps recently fetched source blocks, keyed by
/// sub-swath, band and rectangle.
///
/// Neighbouring output tiles often request the same source block for the same
/// sub-swath; the wrapped source is only asked once while the block stays cached.
pub struct CachedTileSource<S> {
    inner: S,
    cache: Mutex<BlockCache>,
}

impl<S: TileSource> CachedTileSource<S> {
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_CAPACITY_BYTES)
    }

    pub fn with_capacity(inner: S, capacity_bytes: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(BlockCache::new(capacity_bytes)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of cached blocks
    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently held
    pub fn cached_bytes(&self) -> usize {
        self.cache.lock().map(|c| c.current_bytes).unwrap_or(0)
    }

    fn lookup(&self, key: &BlockKey) -> SarResult<Option<Block>> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| SarError::Processing("Source block cache lock poisoned".to_string()))?;
        Ok(cache.get(key))
    }

    fn store(&self, key: BlockKey, block: Block, size_bytes: usize) -> SarResult<()> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| SarError::Processing("Source block cache lock poisoned".to_string()))?;
        cache.insert(key, block, size_bytes);
        Ok(())
    }
}

impl<S: TileSource> TileSource for CachedTileSource<S> {
    fn fetch_complex(&self, subswath: &SubSwathGeometry, band: BandIdentity, rect: TileRect) -> SarResult<SarCInt16Image> {
        let key = BlockKey { subswath: subswath.index, band, rect };
        if let Some(Block::Complex(data)) = self.lookup(&key)? {
            return Ok(data);
        }

        // inner fetch runs without the lock held
        let data = self.inner.fetch_complex(subswath, band, rect)?;
        let size_bytes = data.len() * std::mem::size_of::<crate::types::SarCInt16>();
        self.store(key, Block::Complex(data.clone()), size_bytes)?;
        Ok(data)
    }

    fn fetch_real(&self, subswath: &SubSwathGeometry, band: BandIdentity, rect: TileRect) -> SarResult<SarRealImage> {
        let key = BlockKey { subswath: subswath.index, band, rect };
        if let Some(Block::Real(data)) = self.lookup(&key)? {
            return Ok(data);
        }

        let data = self.inner.fetch_real(subswath, band, rect)?;
        let size_bytes = data.len() * std::mem::size_of::<f32>();
        self.store(key, Block::Real(data.clone()), size_bytes)?;
        Ok(data)
    }

    fn no_data_value(&self, subswath: &SubSwathGeometry, band: BandIdentity) -> f64 {
        self.inner.no_data_value(subswath, band)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Polarization;
    use ndarray::Array2;

    fn key(x: usize) -> BlockKey {
        BlockKey {
            subswath: 0,
            band: BandIdentity::complex(Polarization::VV),
            rect: TileRect::new(x, 0, 1, 1),
        }
    }

    fn block() -> Block {
        Block::Real(Array2::zeros((1, 1)))
    }

    #[test]
    fn test_evicts_least_recently_used_by_bytes() {
        let mut cache = BlockCache::new(100);
        cache.insert(key(0), block(), 40);
        cache.insert(key(1), block(), 40);
        assert!(cache.get(&key(0)).is_some());
        cache.insert(key(2), block(), 40);

        assert!(cache.get(&key(1)).is_none());
        assert!(cache.get(&key(0)).is_some());
        assert_eq!(cache.current_bytes, 80);
    }

    #[test]
    fn test_oversized_block_not_cached() {
        let mut cache = BlockCache::new(10);
        cache.insert(key(0), block(), 40);
        assert!(cache.get(&key(0)).is_none());
        assert_eq!(cache.current_bytes, 0);
    }
}
