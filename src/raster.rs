//! Typed façade over the GDAL codec.
//!
//! Sources are opened read-only, one handle per task; concurrent opens
//! on distinct files are safe. Outputs are either grey UInt16 PNGs
//! (written through an in-memory dataset and copied out, since the PNG
//! driver cannot create directly) or grey Int16 GeoTIFFs created in
//! place.

use crate::error::GdemError;
use crate::geometry::BLOCK_SAMPLES;
use crate::Result;
use anyhow::Context;
use gdal::raster::{Buffer, GdalType};
use gdal::{Dataset, Driver};
use std::path::Path;

/// WGS 84 geographic projection, as written into GeoTIFF outputs.
pub const WGS84_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]]"#;

pub fn open_readonly(path: &Path) -> Result<Dataset> {
    Dataset::open(path).with_context(|| format!("opening dataset {}", path.display()))
}

/// Width, height and band count of a raster, without keeping the
/// handle around.
pub fn probe_dimensions(path: &Path) -> Result<(usize, usize, isize)> {
    let ds = open_readonly(path)?;
    let (w, h) = ds.raster_size();
    Ok((w, h, ds.raster_count()))
}

/// Verify that the codec can serve sub-block sized windows from the
/// native block grid. A smaller native block means the input is not a
/// tiled GDEM raster and no amount of retrying will help.
pub fn require_block_size(ds: &Dataset, path: &Path) -> Result<()> {
    let band = ds.rasterband(1)?;
    let (bx, by) = band.block_size();
    if bx < BLOCK_SAMPLES || by < BLOCK_SAMPLES {
        return Err(GdemError::CodecFatal {
            path: path.to_path_buf(),
            reason: format!(
                "native block size {}x{} is less than {}",
                bx, by, BLOCK_SAMPLES
            ),
        }
        .into());
    }
    Ok(())
}

/// Read a window of `size` pixels at `off` into `out`.
pub fn read_window<T: GdalType + Copy>(
    ds: &Dataset,
    band: isize,
    off: (isize, isize),
    size: (usize, usize),
    out: &mut [T],
) -> Result<()> {
    let band = ds.rasterband(band)?;
    band.read_into_slice(off, size, size, out, None)
        .with_context(|| {
            format!(
                "reading window @ ({},{}) of dimension ({}x{})",
                off.0, off.1, size.0, size.1
            )
        })
}

/// Read the full raster decimated to `out_size` pixels. The codec
/// performs the downsampling.
pub fn read_subsampled<T: GdalType + Copy>(
    ds: &Dataset,
    band: isize,
    out_size: (usize, usize),
    out: &mut [T],
) -> Result<()> {
    let full = ds.raster_size();
    let band = ds.rasterband(band)?;
    band.read_into_slice((0, 0), full, out_size, out, None)
        .with_context(|| format!("subsampled read to ({}x{})", out_size.0, out_size.1))
}

/// Encode a grey UInt16 PNG. The data is staged in a `MEM` dataset and
/// copied out through the PNG driver.
pub fn write_grey_png(path: &Path, size: (usize, usize), data: Vec<u16>) -> Result<()> {
    let mem = Driver::get("MEM")?
        .create_with_band_type::<u16, _>("", size.0 as isize, size.1 as isize, 1)
        .with_context(|| "creating in-memory image")?;
    let mut band = mem.rasterband(1)?;
    band.write((0, 0), size, &Buffer::new(size, data))?;

    let png = Driver::get("PNG")?;
    mem.create_copy(&png, &path.to_string_lossy())
        .with_context(|| format!("creating image {}", path.display()))?;
    Ok(())
}

/// Create a grey Int16 GeoTIFF with an optional geotransform and
/// projection.
pub fn write_grey_tiff(
    path: &Path,
    size: (usize, usize),
    data: Vec<i16>,
    geo_transform: Option<[f64; 6]>,
    projection: Option<&str>,
) -> Result<()> {
    let mut ds = Driver::get("GTiff")?
        .create_with_band_type::<i16, _>(path, size.0 as isize, size.1 as isize, 1)
        .with_context(|| format!("creating image {}", path.display()))?;
    let mut band = ds.rasterband(1)?;
    band.write((0, 0), size, &Buffer::new(size, data))?;

    if let Some(gt) = geo_transform {
        ds.set_geo_transform(&gt)?;
    }
    if let Some(wkt) = projection {
        ds.set_projection(wkt)?;
    }
    Ok(())
}

/// Create an all-zero 4-band byte GeoTIFF (transparent placeholder).
pub fn write_zero_rgba_tiff(path: &Path, size: (usize, usize)) -> Result<()> {
    let ds = Driver::get("GTiff")?
        .create_with_band_type::<u8, _>(path, size.0 as isize, size.1 as isize, 4)
        .with_context(|| format!("creating image {}", path.display()))?;
    for i in 1..=4 {
        let mut band = ds.rasterband(i)?;
        band.write((0, 0), size, &Buffer::new(size, vec![0u8; size.0 * size.1]))?;
    }
    Ok(())
}

/// Encode an all-zero 4-band byte PNG (transparent placeholder).
pub fn write_zero_rgba_png(path: &Path, size: (usize, usize)) -> Result<()> {
    let mem = Driver::get("MEM")?
        .create_with_band_type::<u8, _>("", size.0 as isize, size.1 as isize, 4)
        .with_context(|| "creating in-memory image")?;
    for i in 1..=4 {
        let mut band = mem.rasterband(i)?;
        band.write((0, 0), size, &Buffer::new(size, vec![0u8; size.0 * size.1]))?;
    }

    let png = Driver::get("PNG")?;
    mem.create_copy(&png, &path.to_string_lossy())
        .with_context(|| format!("creating image {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn tiff_roundtrip_keeps_geotransform() -> Result<()> {
        let tmp = TempDir::new("gdem_raster").unwrap();
        let path = tmp.path().join("tile.tif");

        let data: Vec<i16> = (0..16 * 16).map(|v| v as i16 - 100).collect();
        let gt = [89.5, 1.0, 0.0, 45.5, 0.0, -1.0];
        write_grey_tiff(&path, (16, 16), data.clone(), Some(gt), Some(WGS84_WKT))?;

        let ds = open_readonly(&path)?;
        assert_eq!(ds.raster_size(), (16, 16));
        let read_gt = ds.geo_transform()?;
        for i in 0..6 {
            assert!((read_gt[i] - gt[i]).abs() < 1e-9);
        }

        let mut out = vec![0i16; 16 * 16];
        read_window(&ds, 1, (0, 0), (16, 16), &mut out)?;
        assert_eq!(out, data);
        Ok(())
    }

    #[test]
    fn png_roundtrip() -> Result<()> {
        let tmp = TempDir::new("gdem_raster").unwrap();
        let path = tmp.path().join("tile.png");

        let data: Vec<u16> = (0..8 * 8).map(|v| v * 100).collect();
        write_grey_png(&path, (8, 8), data.clone())?;

        let ds = open_readonly(&path)?;
        let mut out = vec![0u16; 8 * 8];
        read_window(&ds, 1, (0, 0), (8, 8), &mut out)?;
        assert_eq!(out, data);
        Ok(())
    }

    #[test]
    fn subsampled_read_halves_a_constant_image() -> Result<()> {
        let tmp = TempDir::new("gdem_raster").unwrap();
        let path = tmp.path().join("const.tif");
        write_grey_tiff(&path, (32, 32), vec![7i16; 32 * 32], None, None)?;

        let ds = open_readonly(&path)?;
        let mut out = vec![0i16; 17 * 17];
        read_subsampled(&ds, 1, (17, 17), &mut out)?;
        assert!(out.iter().all(|&v| v == 7));
        Ok(())
    }
}
