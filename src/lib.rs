//! Library to build geographic (EPSG:4326) elevation tile pyramids
//! from 1°×1° GDEM rasters.

/// The error type returned by this crate. Currently this is
/// a synonym for [ `anyhow::Error` ].
pub type Error = anyhow::Error;

/// The `Result` type returned by this crate.
pub type Result<T> = std::result::Result<T, Error>;

pub mod error;
pub mod geometry;
pub mod raster;

pub mod index;

pub mod cache;
pub mod elevation;

pub mod builder;
pub mod pool;

pub mod prelude;
