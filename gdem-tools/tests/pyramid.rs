//! End-to-end two-pass build over a synthetic source cell.

use gdal::raster::{Buffer, RasterCreationOption};
use gdal::Driver;
use gdem::builder::{BuildConfig, TileBuilder, TileFormat, TileKind};
use gdem::elevation::ElevationSource;
use gdem::index::{self, SourceIndex};
use gdem::{geometry, raster};
use gdem_tools::passes;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tempdir::TempDir;

/// Write a constant-elevation 1°×1° GDEM cell (N23E120) with the
/// native tiling the elevation service requires.
fn write_cell(dir: &Path, value: i16) -> PathBuf {
    let path = dir.join("ASTGTM2_N23E120_dem.tif");
    let options = [
        RasterCreationOption {
            key: "TILED",
            value: "YES",
        },
        RasterCreationOption {
            key: "BLOCKXSIZE",
            value: "256",
        },
        RasterCreationOption {
            key: "BLOCKYSIZE",
            value: "256",
        },
        RasterCreationOption {
            key: "COMPRESS",
            value: "DEFLATE",
        },
    ];
    let ds = Driver::get("GTiff")
        .unwrap()
        .create_with_band_type_with_options::<i16, _>(&path, 3601, 3601, 1, &options)
        .unwrap();
    let mut band = ds.rasterband(1).unwrap();
    band.write(
        (0, 0),
        (3601, 3601),
        &Buffer::new((3601, 3601), vec![value; 3601 * 3601]),
    )
    .unwrap();
    path
}

fn tile_mtimes(root: &Path) -> Vec<(PathBuf, SystemTime)> {
    let mut stamps = vec![];
    for entry in walk(root) {
        let meta = fs::metadata(&entry).unwrap();
        stamps.push((entry, meta.modified().unwrap()));
    }
    stamps.sort();
    stamps
}

fn walk(root: &Path) -> Vec<PathBuf> {
    let mut files = vec![];
    for entry in fs::read_dir(root).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            files.extend(walk(&path));
        } else {
            files.push(path);
        }
    }
    files
}

#[test]
fn two_pass_build_is_complete_and_idempotent() {
    const MAX_LOD: usize = 2;

    let tmp = TempDir::new("gdem_pyramid").unwrap();
    let src_dir = tmp.path().join("source");
    fs::create_dir_all(&src_dir).unwrap();
    write_cell(&src_dir, 100);

    let candidates = index::expand_sources(&[src_dir]);
    assert_eq!(candidates.len(), 1);

    let out_dir = tmp.path().join("tileset");
    let builder = Arc::new(TileBuilder::new(
        Arc::new(ElevationSource::new(SourceIndex::build(&candidates).unwrap())),
        BuildConfig {
            out_dir: out_dir.clone(),
            tile_size: 64,
            format: TileFormat::Grey,
            kind: TileKind::Tiff,
        },
    ));

    passes::base_pass(&builder, MAX_LOD);
    passes::pyramid_pass(&builder, MAX_LOD);
    builder.null_tile().unwrap();

    // The cell pierces every level plus the placeholder.
    for z in 0..=MAX_LOD {
        assert!(out_dir.join(z.to_string()).is_dir(), "level {} missing", z);
    }
    assert!(out_dir.join("2/6/1.tif").is_file());
    assert!(out_dir.join("1/3/0.tif").is_file());
    assert!(out_dir.join("0/1/0.tif").is_file());
    assert!(out_dir.join("null.tif").is_file());

    // The western hemisphere has no coverage at all.
    assert!(!out_dir.join("0/0/0.tif").exists());
    assert!(!out_dir.join("2/0").exists());

    // Pixel-center registration on the base tile.
    let ds = raster::open_readonly(&out_dir.join("2/6/1.tif")).unwrap();
    let bounds = geometry::tile_bounds(2, 6, 1);
    let gt = ds.geo_transform().unwrap();
    assert!((gt[0] + gt[1] * 0.5 - bounds.min().x).abs() < 1e-9);
    assert!((gt[3] + gt[5] * 0.5 - bounds.max().y).abs() < 1e-9);

    // The cell footprint carries the constant elevation; outside is 0.
    let mut data = vec![0i16; 64 * 64];
    raster::read_window(&ds, 1, (0, 0), (64, 64), &mut data).unwrap();
    assert!(data.iter().any(|&v| v == 100));
    assert!(data.iter().all(|&v| v == 0 || v == 100));
    drop(ds);

    // A rerun against the complete tree rewrites nothing.
    let before = tile_mtimes(&out_dir);
    passes::base_pass(&builder, MAX_LOD);
    passes::pyramid_pass(&builder, MAX_LOD);
    builder.null_tile().unwrap();
    let after = tile_mtimes(&out_dir);
    assert_eq!(before, after);
}
