// Main function
gdem_tools::sync_main!(run());

use gdem::builder::{BuildConfig, TileBuilder};
use gdem::elevation::ElevationSource;
use gdem::index::{self, SourceIndex};
use gdem::{geometry, Result};
use gdem_tools::{passes, utils};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

fn run() -> Result<()> {
    let args = parse_cmd_line();

    // Deriving the output root from a missing source exits 123 before
    // anything else happens.
    let out_dir = utils::resolve_out_dir(args.out_dir.clone(), &args.sources);

    let candidates = index::expand_sources(&args.sources);
    if candidates.is_empty() {
        println!("gdem-tileset --source <SOURCE>... -o <OUTDIR>");
        println!();
        println!("No gdem sources found. For a list of options, use --help or -h");
        std::process::exit(1);
    }

    std::fs::create_dir_all(&out_dir)?;

    let log_file = out_dir.join("log.txt");
    utils::init_logging(if args.no_log { None } else { Some(&log_file) });

    if args.mercator {
        warn!("--mercator is not implemented; building geographic tiles");
    }

    let auto_lod = geometry::max_lod_for(args.tile_size);
    let max_lod = if args.max_lod < 0 || args.max_lod > auto_lod as i64 {
        auto_lod
    } else {
        args.max_lod as usize
    };
    info!(
        "{} candidate file(s), building up to level {}",
        candidates.len(),
        max_lod
    );

    let index = SourceIndex::build(&candidates)?;
    info!("indexed {} source cell(s)", index.len());

    let builder = Arc::new(TileBuilder::new(
        Arc::new(ElevationSource::new(index)),
        BuildConfig {
            out_dir: out_dir.clone(),
            tile_size: args.tile_size,
            format: args.out_format,
            kind: args.out_type,
        },
    ));

    let mut durations: Vec<(&str, Duration)> = vec![];
    if !args.no_tileset {
        durations.push(("tileset", passes::base_pass(&builder, max_lod)));
    }
    durations.push(("makelod", passes::pyramid_pass(&builder, max_lod)));

    builder.null_tile()?;

    println!();
    println!("output location:       {}", out_dir.display());
    for (name, duration) in durations {
        println!("duration({}):     {:.3}s", name, duration.as_secs_f64());
    }

    Ok(())
}

mod args;
use args::parse_cmd_line;
