//! Bounded FIFO cache of materialised elevation sub-blocks.
//!
//! The cache is a plain map plus an insertion-order queue behind one
//! mutex. Lookups and inserts are cheap; materialising a missing
//! block (opening the source raster, reading the window) happens
//! outside the lock, so two workers missing the same key may both
//! read it; the first insert wins and the loser's copy is dropped
//! when it finishes with it. Eviction removes the cache's reference
//! only; readers holding the `Arc` keep the block alive.

use crate::geometry::BLOCK_SAMPLES;
use ndarray::Array2;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const DEFAULT_CAPACITY: usize = 20_480;

/// A 226×226 window of source samples covering 0.0625°×0.0625°,
/// anchored at its south-west corner. Row 0 is the north edge.
pub struct Block {
    pub west: f64,
    pub south: f64,
    pub data: Array2<i16>,
}

impl Block {
    pub fn new(west: f64, south: f64, data: Array2<i16>) -> Self {
        debug_assert_eq!(data.dim(), (BLOCK_SAMPLES, BLOCK_SAMPLES));
        Block { west, south, data }
    }

    /// Nearest sample to a point inside the block.
    pub fn sample(&self, lon: f64, lat: f64) -> i16 {
        let (col, row) = crate::geometry::block_col_row(lon, lat, self.west, self.south);
        self.data[(row, col)]
    }
}

struct CacheInner {
    map: HashMap<u32, Arc<Block>>,
    order: VecDeque<u32>,
}

pub struct BlockCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

impl Default for BlockCache {
    fn default() -> Self {
        BlockCache::new(DEFAULT_CAPACITY)
    }
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        BlockCache {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
        }
    }

    pub fn try_get(&self, key: u32) -> Option<Arc<Block>> {
        let inner = self.inner.lock().unwrap();
        inner.map.get(&key).cloned()
    }

    /// Insert a block under `key`. If the key is already present the
    /// call is a no-op (first writer wins). Exceeding the capacity
    /// evicts the oldest insertion.
    pub fn insert(&self, key: u32, block: Arc<Block>) {
        let mut inner = self.inner.lock().unwrap();
        if inner.map.contains_key(&key) {
            return;
        }

        inner.map.insert(key, block);
        inner.order.push_back(key);

        if inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.map.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
