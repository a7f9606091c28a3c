use crate::cli::{PassCounter, Progress};
use gdem::builder::BuildOutcome;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const PROGRESS_UPDATE_MILLIS: u64 = 500;

/// Progress bookkeeping for one build pass: spawns the render thread
/// on construction and joins it on drop.
pub struct PassTracker {
    progress: Arc<Progress<PassCounter>>,
    handle: Option<JoinHandle<()>>,
    started: Instant,
}

impl PassTracker {
    pub fn new(name: &'static str, total: usize) -> Self {
        let progress = Arc::new(Progress::new(PassCounter::new(name)));
        progress.value.total.store(total);
        let handle = progress
            .clone()
            .spawn_auto_update_thread(Duration::from_millis(PROGRESS_UPDATE_MILLIS));
        PassTracker {
            progress,
            handle: Some(handle),
            started: Instant::now(),
        }
    }

    pub fn tick(&self, outcome: BuildOutcome) {
        self.progress.value.processed.fetch_add(1);
        if outcome == BuildOutcome::Skipped {
            self.progress.value.skipped.fetch_add(1);
        }
    }

    /// Account a run of tiles skipped without ever being enqueued.
    pub fn skip_many(&self, count: usize) {
        self.progress.value.processed.fetch_add(count);
        self.progress.value.skipped.fetch_add(count);
    }

    pub fn observe_cache(&self, blocks: usize) {
        self.progress.value.cached_blocks.store(blocks);
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for PassTracker {
    fn drop(&mut self) {
        self.progress.finish();
        if self.handle.take().unwrap().join().is_err() {
            eprintln!("Warning: progress thread panicked!");
        }
    }
}
