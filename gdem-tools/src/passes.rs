//! The two build passes over the pyramid.
//!
//! Pass order matters: every base tile must be on disk before the
//! first overview task runs, and level `z` must be complete before
//! level `z−1` starts, because overview workers open child tiles by
//! path. The pool's drain barrier plus a short settle delay provide
//! both orderings.

use crate::proc::PassTracker;
use gdem::builder::{BuildOutcome, TileBuilder};
use gdem::pool::{self, TaskPool};
use gdem::{error, geometry, Result};
use log::warn;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Outstanding-task ceiling while seeding the base level. Producers
/// are cheap, so a soft ceiling with a sleep is enough back-pressure.
const BASE_CEILING: usize = 10_000;

/// Much tighter ceiling for overview levels: each task holds open
/// child handles and full-tile buffers.
const PYRAMID_CEILING: usize = 100;

const ENQUEUE_POLL: Duration = Duration::from_millis(10);

/// Grace period between levels so child-file metadata is settled
/// before parents open them by path.
const LEVEL_SETTLE: Duration = Duration::from_secs(2);

struct Task {
    z: usize,
    x: usize,
    y: usize,
}

fn tiles_at(z: usize) -> usize {
    let (x_num, y_num) = geometry::tile_counts(z);
    x_num * y_num
}

fn tile_pool(
    builder: &Arc<TileBuilder>,
    tracker: &Arc<PassTracker>,
    build: fn(&TileBuilder, usize, usize, usize) -> Result<BuildOutcome>,
) -> TaskPool<Task> {
    let builder = builder.clone();
    let tracker = tracker.clone();
    TaskPool::new(pool::default_workers(), move |task: Task| {
        match build(&builder, task.z, task.x, task.y) {
            Ok(outcome) => tracker.tick(outcome),
            Err(err) => {
                error::exit_if_fatal(&err);
                warn!("tile {}/{}/{}: {:#}", task.z, task.x, task.y, err);
                tracker.tick(BuildOutcome::Skipped);
            }
        }
        tracker.observe_cache(builder.source().cached_blocks());
    })
}

/// Seed one level into the pool, column by column. Columns with no
/// source coverage are skipped wholesale without touching the pool.
fn enqueue_level(
    pool: &TaskPool<Task>,
    builder: &TileBuilder,
    tracker: &PassTracker,
    z: usize,
    ceiling: usize,
) {
    let (x_num, y_num) = geometry::tile_counts(z);
    let x_step = 360.0 / x_num as f64;
    for x in 0..x_num {
        let west = -180.0 + x as f64 * x_step;
        if !builder
            .source()
            .index()
            .overlaps(west, -90.0, west + x_step, 90.0)
        {
            tracker.skip_many(y_num);
            continue;
        }

        for y in 0..y_num {
            while pool.outstanding() > ceiling {
                thread::sleep(ENQUEUE_POLL);
            }
            pool.add_task(Task { z, x, y });
        }
    }
}

/// Build every tile of the finest level directly from source
/// elevations.
pub fn base_pass(builder: &Arc<TileBuilder>, max_lod: usize) -> Duration {
    let tracker = Arc::new(PassTracker::new("tileset", tiles_at(max_lod)));
    let mut pool = tile_pool(builder, &tracker, TileBuilder::base_tile);

    enqueue_level(&pool, builder, &tracker, max_lod, BASE_CEILING);

    pool.wait_till_empty();
    pool.close();
    tracker.elapsed()
}

/// Walk the pyramid from the finest level down to level 0, draining
/// the pool between levels.
pub fn pyramid_pass(builder: &Arc<TileBuilder>, max_lod: usize) -> Duration {
    let total = (0..max_lod).map(tiles_at).sum();
    let tracker = Arc::new(PassTracker::new("makelod", total));
    let mut pool = tile_pool(builder, &tracker, TileBuilder::overview_tile);

    for z in (0..max_lod).rev() {
        pool.wait_till_empty();
        thread::sleep(LEVEL_SETTLE);
        enqueue_level(&pool, builder, &tracker, z, PYRAMID_CEILING);
    }

    pool.wait_till_empty();
    pool.close();
    tracker.elapsed()
}
