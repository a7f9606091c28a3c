use clap::{value_t, values_t};
use gdem::builder::{TileFormat, TileKind};
use gdem_tools::{flag, opt};
use std::path::PathBuf;

/// Program arguments
pub struct Args {
    /// Source files or directories
    pub sources: Vec<PathBuf>,
    /// Output root, if given
    pub out_dir: Option<PathBuf>,
    /// Max pyramid level; negative selects automatically
    pub max_lod: i64,
    /// Output tile pixel width/height
    pub tile_size: usize,
    /// Output image format
    pub out_format: TileFormat,
    /// Output encoder
    pub out_type: TileKind,
    /// Skip the base-level pass
    pub no_tileset: bool,
    /// Do not append to <outdir>/log.txt
    pub no_log: bool,
    /// Accepted but not wired to the builder
    pub mercator: bool,
}

pub fn parse_cmd_line() -> Args {
    use clap::ErrorKind::InvalidValue;
    use clap::*;
    let matches = gdem_tools::args_parser!("gdem-tileset")
        .about("Build a geographic (EPSG:4326) elevation tile pyramid from GDEM rasters.")
        .arg(
            opt!("source")
                .short("i")
                .required(true)
                .multiple(true)
                .help("Input file(s) or dir(s) of the gdem"),
        )
        .arg(opt!("outdir").short("o").help("Output directory"))
        .arg(opt!("max lod").help("Max level of the tileset; -1 selects the level matching the source resolution"))
        .arg(opt!("tile size").help("Tile pixel size (default: 256)"))
        .arg(
            opt!("out format")
                .possible_values(&["grey", "rgba"])
                .help("Output image format (default: grey)"),
        )
        .arg(
            opt!("out type")
                .possible_values(&["png", "tif"])
                .help("Output image type (default: png)"),
        )
        .arg(flag!("no tileset").help("Skip the base tileset pass"))
        .arg(flag!("no log").help("Do not write log info to <outdir>/log.txt"))
        .arg(flag!("mercator").help("Mercator tiling (not implemented)"))
        .get_matches();

    let sources = values_t!(matches, "source", PathBuf).unwrap_or_else(|e| e.exit());
    let out_dir = value_t!(matches, "outdir", PathBuf).ok();

    let max_lod = value_t!(matches, "max lod", i64).unwrap_or(-1);

    let tile_size = value_t!(matches, "tile size", usize).unwrap_or_else(|_| 256);
    if tile_size < 2 {
        Error::with_description(
            &format!("tile_size must be at least 2: got {}", tile_size),
            InvalidValue,
        )
        .exit();
    }

    let out_format = value_t!(matches, "out format", String)
        .ok()
        .and_then(|s| TileFormat::parse(&s))
        .unwrap_or(TileFormat::Grey);
    let out_type = value_t!(matches, "out type", String)
        .ok()
        .and_then(|s| TileKind::parse(&s))
        .unwrap_or(TileKind::Png);

    Args {
        sources,
        out_dir,
        max_lod,
        tile_size,
        out_format,
        out_type,
        no_tileset: matches.is_present("no tileset"),
        no_log: matches.is_present("no log"),
        mercator: matches.is_present("mercator"),
    }
}
