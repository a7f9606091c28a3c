//! Coordinate math for the geographic tile quadtree and the
//! sub-block grid.
//!
//! Everything here is a pure function. The tile scheme is the
//! EPSG:4326 quadtree: level 0 covers the globe with two 180°×180°
//! tiles side by side, and every level doubles the tile count along
//! each axis. Sub-blocks split each 1°×1° source cell into a 16×16
//! grid of 0.0625° squares, read as 226×226 sample windows so that a
//! block shares its eastern column and northern row with the
//! neighbouring blocks.

use geo::Rect;

/// Axis-aligned geographic region, `min = (west, south)`,
/// `max = (east, north)`.
pub type Bounds = Rect<f64>;

/// Sentinel elevation for missing data.
pub const NODATA: i16 = -9999;

/// Samples along one edge of a source cell.
pub const CELL_SAMPLES: usize = 3601;

/// Samples along one edge of a sub-block, including the seam overlap.
pub const BLOCK_SAMPLES: usize = 226;

/// Degrees covered by one sub-block.
pub const BLOCK_SPAN: f64 = 0.0625;

/// Sub-blocks along one axis of a source cell.
pub const BLOCKS_PER_CELL: i64 = 16;

/// Sub-block columns around the globe (360 · 16).
pub const BLOCK_COLS: i64 = 5760;

/// Angular pitch of one source sample, in degrees.
pub const SAMPLE_STEP: f64 = 1.0 / 3600.0;

const EARTH_LENGTH: f64 = 20_037_508.34;

/// Number of tiles `(x_num, y_num)` at a pyramid level.
pub fn tile_counts(z: usize) -> (usize, usize) {
    (2 << z, 1 << z)
}

/// Geographic bounds of tile `(z, x, y)`. Row 0 touches the north
/// pole.
pub fn tile_bounds(z: usize, x: usize, y: usize) -> Bounds {
    let step = 180.0 / (1 << z) as f64;
    let west = -180.0 + x as f64 * step;
    let north = 90.0 - y as f64 * step;
    Rect::new((west, north - step), (west + step, north))
}

/// Index of the tile containing a point at level `z`. The east and
/// south edges of the domain land in the last row/column.
pub fn tile_at(z: usize, lon: f64, lat: f64) -> (usize, usize) {
    let (x_num, y_num) = tile_counts(z);
    let step = 180.0 / (1 << z) as f64;
    let x = ((lon + 180.0) / step).floor() as usize;
    let y = ((90.0 - lat) / step).floor() as usize;
    (x.min(x_num - 1), y.min(y_num - 1))
}

/// Largest level whose tile resolution still exceeds the source
/// sample pitch. Used when no explicit maximum level is configured.
pub fn max_lod_for(tile_size: usize) -> usize {
    let mut resolution = 180.0 / (tile_size as f64 - 1.0);
    let mut lod = 0;
    while resolution / 2.0 > SAMPLE_STEP {
        lod += 1;
        resolution /= 2.0;
    }
    lod
}

/// Key of the source cell containing a point, by truncation into the
/// 1°×1° grid: `(ilat + 90)·360 + (ilon + 180)`.
pub fn cell_key_at(lon: f64, lat: f64) -> i32 {
    let ilon = (lon + 180.0) as i32;
    let ilat = (lat + 90.0) as i32;
    ilat * 360 + ilon
}

/// Key of the cell with the given integer south-west corner.
pub fn cell_key(ilat: i32, ilon: i32) -> i32 {
    (ilat + 90) * 360 + (ilon + 180)
}

/// Global sub-block indices `(ilon_block, ilat_block)` of the block
/// containing a point.
pub fn block_indices(lon: f64, lat: f64) -> (i64, i64) {
    let ilon_block = (lon * 16.0 + 180.0 * 16.0).floor() as i64;
    let ilat_block = (lat * 16.0 + 90.0 * 16.0).floor() as i64;
    (ilon_block, ilat_block)
}

/// Flat cache key of a sub-block.
pub fn block_key(ilon_block: i64, ilat_block: i64) -> u32 {
    (ilat_block * BLOCK_COLS + ilon_block) as u32
}

/// South-west corner `(west, south)` of a sub-block.
pub fn block_origin(ilon_block: i64, ilat_block: i64) -> (f64, f64) {
    (
        ilon_block as f64 * BLOCK_SPAN - 180.0,
        ilat_block as f64 * BLOCK_SPAN - 90.0,
    )
}

/// Nearest-sample position `(col, row)` of a point inside a block.
/// Row 0 is the north edge; the seam guarantees `col ≤ 225` and
/// `row ≤ 225` for any point within the block span.
pub fn block_col_row(lon: f64, lat: f64, west: f64, south: f64) -> (usize, usize) {
    let unit_col = (lon - west) * 16.0;
    let unit_row = (south + BLOCK_SPAN - lat) * 16.0;
    let col = (225.0 * unit_col + 0.5) as usize;
    let row = (225.0 * unit_row + 0.5) as usize;
    (col, row)
}

/// Pixel-center geotransform for a tile raster: the center of pixel
/// `(0, 0)` sits exactly on `(west, north)`.
pub fn pixel_center_transform(bounds: &Bounds, size: (usize, usize)) -> [f64; 6] {
    let (west, south) = bounds.min().x_y();
    let (east, north) = bounds.max().x_y();
    let x_res = (east - west) / (size.0 as f64 - 1.0);
    let y_res = (south - north) / (size.1 as f64 - 1.0);
    [
        west - x_res * 0.5,
        x_res,
        0.0,
        north - y_res * 0.5,
        0.0,
        y_res,
    ]
}

/// Forward spherical mercator projection.
pub fn lonlat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    use std::f64::consts::PI;
    let x = lon / 180.0 * EARTH_LENGTH;
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() / (PI / 180.0);
    (x, y * EARTH_LENGTH / 180.0)
}

/// Inverse spherical mercator projection.
pub fn mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    use std::f64::consts::PI;
    let lon = x / EARTH_LENGTH * 180.0;
    let lat = y / EARTH_LENGTH * 180.0;
    let lat = 180.0 / PI * (2.0 * (lat * PI / 180.0).exp().atan() - PI / 2.0);
    (lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_bounds_follow_the_quadtree() {
        let world_west = tile_bounds(0, 0, 0);
        assert_eq!(world_west.min().x_y(), (-180.0, -90.0));
        assert_eq!(world_west.max().x_y(), (0.0, 90.0));

        let b = tile_bounds(2, 6, 1);
        assert_eq!(b.min().x_y(), (90.0, 0.0));
        assert_eq!(b.max().x_y(), (135.0, 45.0));
    }

    #[test]
    fn taiwan_cell_lands_in_the_eastern_hemisphere() {
        // N23E120 spans lon 120..121, lat 23..24.
        assert_eq!(tile_at(2, 120.5, 23.5), (6, 1));
    }

    #[test]
    fn tile_roundtrip_through_bounds() {
        for z in 0..6 {
            let (x_num, y_num) = tile_counts(z);
            for &(x, y) in &[(0, 0), (x_num - 1, y_num - 1), (x_num / 2, y_num / 2)] {
                let b = tile_bounds(z, x, y);
                let lon = (b.min().x + b.max().x) / 2.0;
                let lat = (b.min().y + b.max().y) / 2.0;
                assert_eq!(tile_at(z, lon, lat), (x, y));
            }
        }
    }

    #[test]
    fn mercator_roundtrip() {
        for &lat in &[-85.0, -45.0, -0.5, 0.0, 23.24386, 60.0, 85.0] {
            for &lon in &[-179.9, -120.81127, 0.0, 13.4, 179.9] {
                let (x, y) = lonlat_to_mercator(lon, lat);
                let (lon2, lat2) = mercator_to_lonlat(x, y);
                assert!((lon - lon2).abs() <= 1e-9, "lon {} -> {}", lon, lon2);
                assert!((lat - lat2).abs() <= 1e-9, "lat {} -> {}", lat, lat2);
            }
        }
    }

    #[test]
    fn auto_lod_matches_source_pitch() {
        // Cell-sized tiles resolve the full source at level 7.
        assert_eq!(max_lod_for(3601), 7);
        // 256 pixel tiles need deeper levels for the same pitch.
        assert_eq!(max_lod_for(256), 11);
    }

    #[test]
    fn block_indices_and_origin_agree() {
        let (ib, jb) = block_indices(120.81127, 23.24386);
        let (west, south) = block_origin(ib, jb);
        assert!(west <= 120.81127 && 120.81127 < west + BLOCK_SPAN);
        assert!(south <= 23.24386 && 23.24386 < south + BLOCK_SPAN);
    }

    #[test]
    fn seam_points_stay_inside_the_block() {
        let (ib, jb) = block_indices(120.0, 23.0);
        let (west, south) = block_origin(ib, jb);

        // East seam maps to the last column, north seam to row 0.
        let (col, _) = block_col_row(west + BLOCK_SPAN, south + 0.01, west, south);
        assert_eq!(col, 225);
        let (_, row) = block_col_row(west + 0.01, south + BLOCK_SPAN, west, south);
        assert_eq!(row, 0);

        // South-west corner: first column, last row.
        let (col, row) = block_col_row(west, south, west, south);
        assert_eq!((col, row), (0, 225));
    }

    #[test]
    fn pixel_center_registration() {
        let bounds = tile_bounds(2, 6, 1);
        let gt = pixel_center_transform(&bounds, (256, 256));
        let (west, _) = bounds.min().x_y();
        let (_, north) = bounds.max().x_y();
        assert!((gt[0] + gt[1] * 0.5 - west).abs() < 1e-12);
        assert!((gt[3] + gt[5] * 0.5 - north).abs() < 1e-12);
        assert!(gt[5] < 0.0);
    }
}
