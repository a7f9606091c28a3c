//! Tile materialisation.
//!
//! Base-level tiles are sampled straight from the elevation service;
//! every coarser tile is assembled by subsample-reading its four
//! children from disk and copying them into quadrants. The sub-tile
//! size of `W/2 + 1` makes adjacent quadrants share the centre
//! row/column, so siblings stay continuous at the midline.
//!
//! Both builders are idempotent: a tile whose output file already
//! exists is skipped, which doubles as the resume mechanism.

use crate::elevation::ElevationSource;
use crate::error::GdemError;
use crate::geometry::{self, Bounds};
use crate::{raster, Result};
use anyhow::Context;
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    Png,
    Tiff,
}

impl TileKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Some(TileKind::Png),
            "tif" => Some(TileKind::Tiff),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TileKind::Png => "png",
            TileKind::Tiff => "tif",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
    Grey,
    Rgba,
}

impl TileFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "grey" => Some(TileFormat::Grey),
            "rgba" => Some(TileFormat::Rgba),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct BuildConfig {
    pub out_dir: PathBuf,
    pub tile_size: usize,
    pub format: TileFormat,
    pub kind: TileKind,
}

/// What a builder call did. Skips count toward pass completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Written,
    Skipped,
}

pub struct TileBuilder {
    source: Arc<ElevationSource>,
    cfg: BuildConfig,
    repair: Mutex<()>,
}

impl TileBuilder {
    pub fn new(source: Arc<ElevationSource>, cfg: BuildConfig) -> Self {
        TileBuilder {
            source,
            cfg,
            repair: Mutex::new(()),
        }
    }

    pub fn source(&self) -> &ElevationSource {
        &self.source
    }

    pub fn config(&self) -> &BuildConfig {
        &self.cfg
    }

    pub fn tile_path(&self, z: usize, x: usize, y: usize) -> PathBuf {
        self.cfg
            .out_dir
            .join(z.to_string())
            .join(x.to_string())
            .join(format!("{}.{}", y, self.cfg.kind.extension()))
    }

    /// Materialise a finest-level tile from source elevations.
    pub fn base_tile(&self, z: usize, x: usize, y: usize) -> Result<BuildOutcome> {
        let path = self.tile_path(z, x, y);
        if path.exists() {
            return Ok(BuildOutcome::Skipped);
        }

        let bounds = geometry::tile_bounds(z, x, y);
        let (west, south) = bounds.min().x_y();
        let (east, north) = bounds.max().x_y();
        if !self.source.index().overlaps(west, south, east, north) {
            return Ok(BuildOutcome::Skipped);
        }
        if self.cfg.format != TileFormat::Grey {
            // Only grey elevation tiles are produced.
            return Ok(BuildOutcome::Skipped);
        }

        let size = self.cfg.tile_size;
        let mut data = vec![0i16; size * size];
        self.source
            .fill_grid(west, south, east, north, (size, size), &mut data)?;

        self.encode(&path, &bounds, data)?;
        Ok(BuildOutcome::Written)
    }

    /// Assemble a tile from its four children on disk. Children are
    /// subsample-read to `W/2 + 1` and copied into quadrants; a child
    /// that fails to read is recreated once before the parent is
    /// abandoned.
    pub fn overview_tile(&self, z: usize, x: usize, y: usize) -> Result<BuildOutcome> {
        let path = self.tile_path(z, x, y);
        if path.exists() {
            return Ok(BuildOutcome::Skipped);
        }
        if self.cfg.format != TileFormat::Grey {
            return Ok(BuildOutcome::Skipped);
        }

        let size = self.cfg.tile_size;
        let sub = (size / 2 + 1, size / 2 + 1);

        let children: Vec<_> = [(0, 0), (0, 1), (1, 0), (1, 1)]
            .iter()
            .map(|&(cx, cy)| {
                let child = (z + 1, 2 * x + cx, 2 * y + cy);
                let path = self.tile_path(child.0, child.1, child.2);
                (cx, cy, child, path)
            })
            .collect();
        if children.iter().all(|(_, _, _, p)| !p.exists()) {
            return Ok(BuildOutcome::Skipped);
        }

        let mut data = vec![0i16; size * size];
        let mut subdata = vec![0i16; sub.0 * sub.1];
        for (cx, cy, child, child_path) in &children {
            if !child_path.exists() {
                continue;
            }
            if let Err(err) = self.read_child(*child, child_path, sub, &mut subdata) {
                warn!("{}: {:#}", child_path.display(), err);
                warn!("abandoning tile {}/{}/{}", z, x, y);
                return Ok(BuildOutcome::Skipped);
            }

            let dest = (
                if *cx == 0 { 0 } else { size - sub.0 },
                if *cy == 0 { 0 } else { size - sub.1 },
            );
            blit_quadrant(&mut data, size, sub, dest, &subdata);
        }

        let bounds = geometry::tile_bounds(z, x, y);
        self.encode(&path, &bounds, data)?;
        Ok(BuildOutcome::Written)
    }

    /// Write the `null.<ext>` placeholder into the output root.
    pub fn null_tile(&self) -> Result<()> {
        fs::create_dir_all(&self.cfg.out_dir)
            .with_context(|| format!("creating directory {}", self.cfg.out_dir.display()))?;
        let path = self
            .cfg
            .out_dir
            .join(format!("null.{}", self.cfg.kind.extension()));
        if path.exists() {
            return Ok(());
        }
        let size = (self.cfg.tile_size, self.cfg.tile_size);

        match (self.cfg.format, self.cfg.kind) {
            (TileFormat::Grey, TileKind::Png) => {
                raster::write_grey_png(&path, size, vec![0u16; size.0 * size.1])
            }
            (TileFormat::Grey, TileKind::Tiff) => {
                raster::write_grey_tiff(&path, size, vec![0i16; size.0 * size.1], None, None)
            }
            (TileFormat::Rgba, TileKind::Png) => raster::write_zero_rgba_png(&path, size),
            (TileFormat::Rgba, TileKind::Tiff) => raster::write_zero_rgba_tiff(&path, size),
        }
    }

    fn read_child(
        &self,
        child: (usize, usize, usize),
        path: &Path,
        sub: (usize, usize),
        out: &mut [i16],
    ) -> Result<()> {
        match self.try_read_child(path, sub, out) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!("{}: {:#}", path.display(), err);
                warn!("trying to recreate {}", path.display());
                self.recreate_child(child, path)?;
                self.try_read_child(path, sub, out)
            }
        }
    }

    fn try_read_child(&self, path: &Path, sub: (usize, usize), out: &mut [i16]) -> Result<()> {
        let ds = raster::open_readonly(path)?;
        raster::read_subsampled(&ds, 1, sub, out)
    }

    /// One-shot self-heal of an unreadable child tile. Serialised
    /// across workers, and deliberately sequential: recreation never
    /// re-enters the task pool.
    fn recreate_child(&self, (z, x, y): (usize, usize, usize), path: &Path) -> Result<()> {
        let _guard = self.repair.lock().unwrap();
        if path.exists() {
            fs::remove_file(path).with_context(|| format!("removing {}", path.display()))?;
        }
        self.base_tile(z, x, y)?;
        Ok(())
    }

    fn encode(&self, path: &Path, bounds: &Bounds, data: Vec<i16>) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }

        let size = (self.cfg.tile_size, self.cfg.tile_size);
        let written = match self.cfg.kind {
            TileKind::Png => {
                let data = data.into_iter().map(|v| v as u16).collect();
                raster::write_grey_png(path, size, data)
            }
            TileKind::Tiff => {
                let gt = geometry::pixel_center_transform(bounds, size);
                raster::write_grey_tiff(path, size, data, Some(gt), Some(raster::WGS84_WKT))
            }
        };

        written.map_err(|err| {
            let _ = fs::remove_file(path);
            GdemError::TileIo {
                path: path.to_path_buf(),
                reason: format!("{:#}", err),
            }
            .into()
        })
    }
}

/// Copy a sub-tile into its quadrant of the output grid.
fn blit_quadrant(
    out: &mut [i16],
    size: usize,
    sub: (usize, usize),
    dest: (usize, usize),
    subdata: &[i16],
) {
    let (sub_w, sub_h) = sub;
    for row in 0..sub_h {
        let src = &subdata[row * sub_w..(row + 1) * sub_w];
        let start = (dest.1 + row) * size + dest.0;
        out[start..start + sub_w].copy_from_slice(src);
    }
}
