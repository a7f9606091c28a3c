use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct Counter {
    val: AtomicUsize,
}
impl Counter {
    pub fn load(&self) -> usize {
        self.val.load(Ordering::Acquire)
    }

    pub fn store(&self, val: usize) {
        self.val.store(val, Ordering::Release)
    }

    pub fn fetch_add(&self, inc: usize) -> usize {
        self.val.fetch_add(inc, Ordering::AcqRel)
    }
}
impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.load())
    }
}

/// Lifecycle counters for one build pass. Observation only; the
/// builders never read these back.
#[derive(Debug)]
pub struct PassCounter {
    pub total: Counter,
    pub processed: Counter,
    pub skipped: Counter,
    pub cached_blocks: Counter,
    name: &'static str,
}
impl PassCounter {
    pub fn new(name: &'static str) -> Self {
        PassCounter {
            total: Default::default(),
            processed: Default::default(),
            skipped: Default::default(),
            cached_blocks: Default::default(),
            name,
        }
    }
}
impl fmt::Display for PassCounter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: {} of {} tiles",
            self.name,
            self.processed.load(),
            self.total.load()
        )?;
        let skipped = self.skipped.load();
        if skipped > 0 {
            write!(f, " ({} skipped)", skipped)?;
        }
        let cached = self.cached_blocks.load();
        if cached > 0 {
            write!(f, ", {} blocks cached", cached)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_counter_renders_progress() {
        let counter = PassCounter::new("tileset");
        counter.total.store(32);
        counter.processed.fetch_add(12);
        assert_eq!(format!("{}", counter), "tileset: 12 of 32 tiles");

        counter.skipped.fetch_add(4);
        counter.cached_blocks.store(7);
        assert_eq!(
            format!("{}", counter),
            "tileset: 12 of 32 tiles (4 skipped), 7 blocks cached"
        );
    }
}
