//! Bounded-parallel task dispatch with drain semantics.
//!
//! A fixed set of worker threads consumes tasks from an unbounded
//! channel. Producers track the outstanding (queued plus executing)
//! count and can block until it reaches zero, which is what the
//! pyramid passes use as their per-level barrier. A failing or
//! panicking task never takes a worker down with it.

use crossbeam_channel::{unbounded, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// Default worker count: twice the logical cores, since tasks spend
/// most of their time in codec I/O.
pub fn default_workers() -> usize {
    num_cpus::get() * 2
}

struct Outstanding {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Outstanding {
    fn enter(&self) {
        *self.count.lock().unwrap() += 1;
    }

    fn exit(&self) {
        let mut count = self.count.lock().unwrap();
        *count -= 1;
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    fn current(&self) -> usize {
        *self.count.lock().unwrap()
    }

    fn wait_empty(&self) {
        let mut count = self.count.lock().unwrap();
        while *count > 0 {
            count = self.drained.wait(count).unwrap();
        }
    }
}

pub struct TaskPool<T> {
    sender: Option<Sender<T>>,
    workers: Vec<JoinHandle<()>>,
    outstanding: Arc<Outstanding>,
}

impl<T: Send + 'static> TaskPool<T> {
    /// Spawn `workers` threads, each running `task_fn` over incoming
    /// tasks until the pool is closed.
    pub fn new<F>(workers: usize, task_fn: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let (sender, receiver) = unbounded::<T>();
        let task_fn = Arc::new(task_fn);
        let outstanding = Arc::new(Outstanding {
            count: Mutex::new(0),
            drained: Condvar::new(),
        });

        let workers = (0..workers)
            .map(|i| {
                let receiver = receiver.clone();
                let task_fn = task_fn.clone();
                let outstanding = outstanding.clone();
                thread::Builder::new()
                    .name(format!("tile-worker-{}", i))
                    .spawn(move || {
                        for task in receiver.iter() {
                            if catch_unwind(AssertUnwindSafe(|| task_fn(task))).is_err() {
                                log::error!("task panicked; worker continues");
                            }
                            outstanding.exit();
                        }
                    })
                    .expect("spawning worker thread")
            })
            .collect();

        TaskPool {
            sender: Some(sender),
            workers,
            outstanding,
        }
    }

    pub fn add_task(&self, task: T) {
        self.outstanding.enter();
        self.sender
            .as_ref()
            .expect("pool is closed")
            .send(task)
            .expect("workers are alive");
    }

    /// Tasks queued or currently executing. Producers poll this to
    /// apply back-pressure.
    pub fn outstanding(&self) -> usize {
        self.outstanding.current()
    }

    /// Block until the queue drains and all in-flight tasks finish.
    pub fn wait_till_empty(&self) {
        self.outstanding.wait_empty();
    }

    /// Stop accepting tasks, let the workers drain what is queued and
    /// join them. No task runs past this call.
    pub fn close(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("worker thread panicked");
            }
        }
    }
}

impl<T> Drop for TaskPool<T> {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn runs_every_task() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut pool = {
            let done = done.clone();
            TaskPool::new(4, move |n: usize| {
                done.fetch_add(n, Ordering::SeqCst);
            })
        };

        for _ in 0..1000 {
            pool.add_task(1);
        }
        pool.wait_till_empty();
        assert_eq!(done.load(Ordering::SeqCst), 1000);
        assert_eq!(pool.outstanding(), 0);
        pool.close();
    }

    #[test]
    fn panicking_tasks_do_not_poison_the_pool() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut pool = {
            let done = done.clone();
            TaskPool::new(2, move |n: usize| {
                if n == 0 {
                    panic!("boom");
                }
                done.fetch_add(1, Ordering::SeqCst);
            })
        };

        for i in 0..100 {
            pool.add_task(i % 10);
        }
        pool.wait_till_empty();
        pool.close();
        assert_eq!(done.load(Ordering::SeqCst), 90);
    }

    #[test]
    fn wait_till_empty_observes_slow_tasks() {
        let done = Arc::new(AtomicUsize::new(0));
        let pool = {
            let done = done.clone();
            TaskPool::new(2, move |_: ()| {
                thread::sleep(Duration::from_millis(20));
                done.fetch_add(1, Ordering::SeqCst);
            })
        };

        for _ in 0..8 {
            pool.add_task(());
        }
        pool.wait_till_empty();
        assert_eq!(done.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn close_joins_after_drain() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut pool = {
            let done = done.clone();
            TaskPool::new(3, move |_: ()| {
                done.fetch_add(1, Ordering::SeqCst);
            })
        };
        for _ in 0..50 {
            pool.add_task(());
        }
        pool.wait_till_empty();
        pool.close();
        assert_eq!(done.load(Ordering::SeqCst), 50);
    }
}
