//! Typed failure taxonomy for the build passes.
//!
//! Most fallible paths in this crate return [`crate::Result`], but the
//! passes need to tell three situations apart: a rejected source cell
//! (skip it), a broken tile file (skip the tile, maybe self-heal), and
//! a codec assumption that does not hold for the input at all (stop the
//! process). The typed variants below survive the trip through
//! `anyhow::Error` and can be recovered with `downcast_ref`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GdemError {
    /// A candidate file is not a usable GDEM cell. The cell is skipped
    /// and indexing continues.
    #[error("{}: rejected gdem source ({reason})", .path.display())]
    InputFormat { path: PathBuf, reason: String },

    /// The codec cannot satisfy a hard assumption about the source
    /// (native block size below the sub-block size, unreadable source
    /// raster). Nothing useful can be built from such an input.
    #[error("{}: {reason}", .path.display())]
    CodecFatal { path: PathBuf, reason: String },

    /// Open/read/write of a tile file failed. Confined to that tile.
    #[error("{}: {reason}", .path.display())]
    TileIo { path: PathBuf, reason: String },
}

impl GdemError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, GdemError::CodecFatal { .. })
    }
}

/// Terminate the process if `err` carries a fatal codec error.
///
/// Workers call this before confining an error to the failing tile: a
/// source raster the codec cannot serve will fail every tile the same
/// way, so continuing would only grind through the remaining queue.
pub fn exit_if_fatal(err: &crate::Error) {
    if let Some(gdem) = err.downcast_ref::<GdemError>() {
        if gdem.is_fatal() {
            log::error!("{:#}", err);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_survives_anyhow_roundtrip() {
        let err: crate::Error = GdemError::CodecFatal {
            path: PathBuf::from("n00e000_dem.tif"),
            reason: "native block size 128x128 is less than 226".into(),
        }
        .into();

        let gdem = err.downcast_ref::<GdemError>().expect("typed error");
        assert!(gdem.is_fatal());
    }

    #[test]
    fn tile_errors_are_not_fatal() {
        let err = GdemError::TileIo {
            path: PathBuf::from("3/2/1.png"),
            reason: "short read".into(),
        };
        assert!(!err.is_fatal());
    }
}
