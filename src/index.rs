//! Spatial catalogue of GDEM source cells.
//!
//! The index is built once, up front, by scanning the configured
//! source roots, and is read-only afterwards. It answers two
//! questions: which file serves a point (`path_of`) and whether any
//! source cell intersects a region (`overlaps`). The latter is what
//! lets the passes skip whole empty columns of the globe.

use crate::error::GdemError;
use crate::geometry::{cell_key, cell_key_at, CELL_SAMPLES};
use crate::{raster, Result};
use anyhow::bail;
use log::warn;
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

/// One indexed cell: the flat key plus its `[west, south, east,
/// north]` bounding box.
struct CellRecord {
    key: i32,
    bounds: [f64; 4],
}

impl RTreeObject for CellRecord {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds[0], self.bounds[1]],
            [self.bounds[2], self.bounds[3]],
        )
    }
}

pub struct SourceIndex {
    cells: HashMap<i32, PathBuf>,
    tree: RTree<CellRecord>,
}

/// Expand the configured roots into candidate files: directories
/// recurse, and only names ending in `dem.tif` qualify.
pub fn expand_sources(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut candidates = vec![];
    for root in roots {
        if root.is_dir() {
            for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() && is_dem_name(entry.path()) {
                    candidates.push(entry.path().to_path_buf());
                }
            }
        } else if root.is_file() && is_dem_name(root) {
            candidates.push(root.clone());
        }
    }
    candidates
}

fn is_dem_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_ascii_lowercase().ends_with("dem.tif"))
        .unwrap_or(false)
}

/// Parse the `…_<N|S>dd<E|W>ddd…` cell code out of a file stem.
/// Returns the integer south-west corner `(ilat, ilon)`.
///
/// The code starts right after the first `_`; a stem without one is
/// rejected outright. Hemisphere letters are case-sensitive.
pub fn parse_cell_code(stem: &str) -> Option<(i32, i32)> {
    let underscore = stem.find('_')?;
    let code = stem.as_bytes().get(underscore + 1..)?;
    if code.len() < 7 {
        return None;
    }

    let lat_hemi = match code[0] {
        b'N' => 1,
        b'S' => -1,
        _ => return None,
    };
    let lon_hemi = match code[3] {
        b'E' => 1,
        b'W' => -1,
        _ => return None,
    };
    let ilat: i32 = std::str::from_utf8(&code[1..3]).ok()?.parse().ok()?;
    let ilon: i32 = std::str::from_utf8(&code[4..7]).ok()?.parse().ok()?;

    Some((lat_hemi * ilat, lon_hemi * ilon))
}

fn probe_cell(path: &Path) -> Result<(i32, i32)> {
    let reject = |reason: String| GdemError::InputFormat {
        path: path.to_path_buf(),
        reason,
    };

    let (w, h, _) = raster::probe_dimensions(path)?;
    if w != CELL_SAMPLES || h != CELL_SAMPLES {
        return Err(reject(format!("unexpected dimensions {}x{}", w, h)).into());
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| reject("unreadable file name".into()))?;
    parse_cell_code(stem).ok_or_else(|| reject("no cell code in file name".into()).into())
}

impl SourceIndex {
    /// Probe and index the candidate files. Bad cells are logged and
    /// skipped; an index that ends up empty is an error.
    pub fn build(candidates: &[PathBuf]) -> Result<Self> {
        let index = Mutex::new((HashMap::new(), RTree::new()));

        candidates.par_iter().for_each(|path| match probe_cell(path) {
            Ok((ilat, ilon)) => {
                let record = CellRecord {
                    key: cell_key(ilat, ilon),
                    bounds: [
                        ilon as f64,
                        ilat as f64,
                        ilon as f64 + 1.0,
                        ilat as f64 + 1.0,
                    ],
                };

                let mut guard = index.lock().unwrap();
                let (cells, tree) = &mut *guard;
                match cells.entry(record.key) {
                    Entry::Vacant(slot) => {
                        slot.insert(path.clone());
                        tree.insert(record);
                    }
                    Entry::Occupied(_) => {
                        warn!("{}: duplicate cell code, keeping first", path.display())
                    }
                }
            }
            Err(err) => warn!("{:#}", err),
        });

        let (cells, tree) = index.into_inner().unwrap();
        if cells.is_empty() {
            bail!("no usable gdem sources found");
        }
        Ok(SourceIndex { cells, tree })
    }

    /// Path of the cell containing a point, if one was indexed.
    pub fn path_of(&self, lon: f64, lat: f64) -> Option<&Path> {
        self.cells.get(&cell_key_at(lon, lat)).map(PathBuf::as_path)
    }

    /// True iff at least one source cell intersects the region.
    pub fn overlaps(&self, west: f64, south: f64, east: f64, north: f64) -> bool {
        let query = AABB::from_corners([west, south], [east, north]);
        self.tree
            .locate_in_envelope_intersecting(&query)
            .next()
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_four_hemisphere_combinations() {
        assert_eq!(parse_cell_code("ASTGTM2_N23E120_dem"), Some((23, 120)));
        assert_eq!(parse_cell_code("ASTGTM2_S09W077_dem"), Some((-9, -77)));
        assert_eq!(parse_cell_code("X_N00W001"), Some((0, -1)));
        assert_eq!(parse_cell_code("X_S56E000suffix"), Some((-56, 0)));
    }

    #[test]
    fn rejects_malformed_codes() {
        // No underscore at all: must be rejected, not mis-indexed.
        assert_eq!(parse_cell_code("N23E120dem"), None);
        // Lower-case hemisphere letters do not match.
        assert_eq!(parse_cell_code("ASTGTM2_n23e120_dem"), None);
        // Truncated code.
        assert_eq!(parse_cell_code("ASTGTM2_N23E12"), None);
        assert_eq!(parse_cell_code("ASTGTM2_"), None);
        assert_eq!(parse_cell_code("ASTGTM2_NAAE120"), None);
    }

    #[test]
    fn expansion_filters_by_suffix() {
        use std::fs::File;
        let tmp = tempdir::TempDir::new("gdem_index").unwrap();
        let nested = tmp.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        File::create(nested.join("ASTGTM2_N23E120_dem.tif")).unwrap();
        File::create(nested.join("readme.txt")).unwrap();
        File::create(tmp.path().join("ASTGTM2_N24E120_DEM.TIF")).unwrap();

        let found = expand_sources(&[tmp.path().to_path_buf()]);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| is_dem_name(p)));
    }

    fn index_of(cells: &[(i32, i32)]) -> SourceIndex {
        let mut map = HashMap::new();
        let mut tree = RTree::new();
        for &(ilat, ilon) in cells {
            let key = cell_key(ilat, ilon);
            map.insert(key, PathBuf::from(format!("{}.tif", key)));
            tree.insert(CellRecord {
                key,
                bounds: [
                    ilon as f64,
                    ilat as f64,
                    ilon as f64 + 1.0,
                    ilat as f64 + 1.0,
                ],
            });
        }
        SourceIndex { cells: map, tree }
    }

    #[test]
    fn overlap_queries_respect_cell_bounds() {
        let index = index_of(&[(0, 0)]);

        assert!(index.overlaps(-180.0, -90.0, 180.0, 90.0));
        assert!(index.overlaps(0.1, 0.1, 0.5, 0.5));
        assert!(!index.overlaps(-10.0, -10.0, -1.0, -1.0));
    }

    #[test]
    fn point_lookup_truncates_into_the_grid() {
        let index = index_of(&[(23, 120), (-9, -77)]);

        assert!(index.path_of(120.5, 23.9).is_some());
        assert!(index.path_of(-76.1, -8.2).is_some());
        assert!(index.path_of(119.9, 23.5).is_none());
        assert_eq!(index.len(), 2);
    }
}
