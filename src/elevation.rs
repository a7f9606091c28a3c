//! Point and grid elevation queries over the source index.
//!
//! Misses materialise a sub-block by opening the owning source raster,
//! reading one 226×226 window and closing it again; the block then
//! lands in the shared cache. Every worker thread queries the same
//! `ElevationSource` concurrently.

use crate::cache::{Block, BlockCache};
use crate::error::GdemError;
use crate::geometry::{self, BLOCKS_PER_CELL, BLOCK_SAMPLES, NODATA};
use crate::index::SourceIndex;
use crate::{raster, Result};
use log::warn;
use ndarray::Array2;
use std::path::Path;
use std::sync::Arc;

pub struct ElevationSource {
    index: SourceIndex,
    cache: BlockCache,
}

impl ElevationSource {
    pub fn new(index: SourceIndex) -> Self {
        ElevationSource {
            index,
            cache: BlockCache::default(),
        }
    }

    pub fn with_cache_capacity(index: SourceIndex, capacity: usize) -> Self {
        ElevationSource {
            index,
            cache: BlockCache::new(capacity),
        }
    }

    pub fn index(&self) -> &SourceIndex {
        &self.index
    }

    /// Number of blocks currently cached.
    pub fn cached_blocks(&self) -> usize {
        self.cache.len()
    }

    /// Nearest-sample elevation at a point. Points outside every
    /// indexed cell yield [`NODATA`].
    pub fn elevation_at(&self, lon: f64, lat: f64) -> Result<i16> {
        let path = match self.index.path_of(lon, lat) {
            Some(path) => path,
            None => return Ok(NODATA),
        };

        let (ilon_block, ilat_block) = geometry::block_indices(lon, lat);
        let key = geometry::block_key(ilon_block, ilat_block);

        let block = match self.cache.try_get(key) {
            Some(block) => block,
            None => {
                let block = Arc::new(self.load_block(path, ilon_block, ilat_block)?);
                self.cache.insert(key, block.clone());
                block
            }
        };

        let elevation = block.sample(lon, lat);
        if elevation <= NODATA {
            warn!("found nodata at {}", path.display());
        }
        Ok(elevation)
    }

    /// Sample a regular grid over `[west, east] × [south, north]` into
    /// `out` (row 0 is the north edge). Missing data becomes 0.
    pub fn fill_grid(
        &self,
        west: f64,
        south: f64,
        east: f64,
        north: f64,
        size: (usize, usize),
        out: &mut [i16],
    ) -> Result<()> {
        let (width, height) = size;
        assert_eq!(out.len(), width * height);

        let x_step = (east - west) / (width as f64 - 1.0);
        let y_step = (north - south) / (height as f64 - 1.0);
        for y in 0..height {
            let lat = north - y as f64 * y_step;
            for x in 0..width {
                let lon = west + x as f64 * x_step;
                let elevation = self.elevation_at(lon, lat)?;
                out[y * width + x] = if elevation <= NODATA { 0 } else { elevation };
            }
        }
        Ok(())
    }

    /// Read one sub-block window from its source raster. Source rows
    /// grow southward, hence the flipped row offset.
    fn load_block(&self, path: &Path, ilon_block: i64, ilat_block: i64) -> Result<Block> {
        let fatal = |reason: String| GdemError::CodecFatal {
            path: path.to_path_buf(),
            reason,
        };

        let ds = raster::open_readonly(path).map_err(|e| fatal(format!("{:#}", e)))?;
        raster::require_block_size(&ds, path)?;

        let pitch = (BLOCK_SAMPLES - 1) as i64;
        let x_off = (ilon_block.rem_euclid(BLOCKS_PER_CELL) * pitch) as isize;
        let y_off = ((BLOCKS_PER_CELL - 1 - ilat_block.rem_euclid(BLOCKS_PER_CELL)) * pitch) as isize;

        let mut data = vec![0i16; BLOCK_SAMPLES * BLOCK_SAMPLES];
        raster::read_window(
            &ds,
            1,
            (x_off, y_off),
            (BLOCK_SAMPLES, BLOCK_SAMPLES),
            &mut data,
        )
        .map_err(|e| fatal(format!("{:#}", e)))?;

        let (west, south) = geometry::block_origin(ilon_block, ilat_block);
        let data = Array2::from_shape_vec((BLOCK_SAMPLES, BLOCK_SAMPLES), data)?;
        Ok(Block::new(west, south, data))
    }
}
