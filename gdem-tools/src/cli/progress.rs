use indicatif::ProgressBar;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A wrapper for a progress spinner with a displayable value. The
/// value type `T` is typically a counter set.
pub struct Progress<T> {
    pub bar: ProgressBar,
    pub value: T,
    done: AtomicBool,
}

impl<T> Progress<T> {
    pub fn new(value: T) -> Self {
        let bar = {
            use indicatif::*;
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {msg}"),
            );
            bar
        };
        Progress {
            bar,
            value,
            done: AtomicBool::new(false),
        }
    }

    pub fn done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn finish(&self) {
        self.done.store(true, Ordering::Release);
    }
}

impl<T: Display> Progress<T> {
    pub fn update_progress(&self) {
        self.bar.set_message(&format!("{}", self.value));
    }

    /// Re-render at the given interval. Only exits after `finish` is
    /// called in another thread; renders one final time so the last
    /// counts are visible.
    pub fn update_until_done(&self, interval: Duration) {
        use std::thread;
        while !self.done() {
            self.update_progress();
            thread::park_timeout(interval);
        }
        self.update_progress();
        self.bar.finish();
    }
}

use std::sync::Arc;
use std::thread::JoinHandle;
impl<T: Send + Sync + Display + 'static> Progress<T> {
    pub fn spawn_auto_update_thread(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        std::thread::spawn(move || self.update_until_done(interval))
    }
}
