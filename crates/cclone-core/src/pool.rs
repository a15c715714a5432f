//! Fixed-size worker pool with a FIFO task queue.
//!
//! Workers sleep on a condition variable while the queue is empty.
//! `wait()` blocks until the queue is empty and nothing is in flight; an
//! explicit in-flight counter is kept because a worker may have dequeued
//! a task it has not yet finished. Destruction stops the pool, wakes all
//! workers, and joins them: queued tasks are drained on a normal
//! shutdown and dropped when the process has been interrupted.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::errors::{CopyError, ErrorKind, Result};
use crate::interrupt;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    queue: VecDeque<Task>,
    in_flight: usize,
    stopped: bool,
}

struct PoolShared {
    state: Mutex<PoolState>,
    task_added: Condvar,
    idle: Condvar,
}

pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn a pool with `threads` workers (at least one).
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                in_flight: 0,
                stopped: false,
            }),
            task_added: Condvar::new(),
            idle: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("cclone-worker-{i}"))
                .spawn(move || worker_loop(&shared))
                .map_err(|e| CopyError::io("spawn worker thread", &e))?;
            workers.push(handle);
        }

        Ok(Self { shared, workers })
    }

    /// Enqueue a task. Fails once the pool has been stopped.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.shared.state.lock();
            if state.stopped {
                return Err(CopyError::new(
                    ErrorKind::UnsupportedFeature,
                    "cannot submit to a stopped worker pool",
                ));
            }
            state.queue.push_back(Box::new(task));
        }
        self.shared.task_added.notify_one();
        Ok(())
    }

    /// Block until the queue is empty and no task is in flight.
    pub fn wait(&self) {
        let mut state = self.shared.state.lock();
        while !(state.queue.is_empty() && state.in_flight == 0) {
            self.shared.idle.wait(&mut state);
        }
    }

    /// Request stop and wake all workers. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
        }
        self.shared.task_added.notify_all();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: &PoolShared) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            while state.queue.is_empty() && !state.stopped {
                shared.task_added.wait(&mut state);
            }
            if state.stopped && interrupt::is_set() {
                // Interrupted shutdown: pending tasks are dropped, not run.
                state.queue.clear();
                if state.in_flight == 0 {
                    shared.idle.notify_all();
                }
                return;
            }
            match state.queue.pop_front() {
                Some(task) => {
                    state.in_flight += 1;
                    task
                }
                // Stopped and fully drained.
                None => return,
            }
        };

        // A panicking task must not take the worker (or the in-flight
        // accounting) down with it.
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            log::error!("worker task panicked");
        }

        let mut state = shared.state.lock();
        state.in_flight -= 1;
        if state.queue.is_empty() && state.in_flight == 0 {
            shared.idle.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn executes_all_submitted_tasks() {
        let pool = WorkerPool::new(4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..128 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        }
        pool.wait();

        assert_eq!(counter.load(Ordering::Relaxed), 128);
    }

    #[test]
    fn wait_accounts_for_in_flight_tasks() {
        let pool = WorkerPool::new(2).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let done = Arc::clone(&done);
            pool.submit(move || {
                std::thread::sleep(Duration::from_millis(50));
                done.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        }
        // A dequeued-but-unfinished task must still hold wait() back.
        pool.wait();

        assert_eq!(done.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn wait_on_idle_pool_returns_immediately() {
        let pool = WorkerPool::new(2).unwrap();
        pool.wait();
    }

    #[test]
    fn submit_after_shutdown_fails_fatally() {
        let pool = WorkerPool::new(1).unwrap();
        pool.shutdown();

        let err = pool.submit(|| {}).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedFeature);
        assert!(err.is_fatal());
    }

    #[test]
    fn drop_drains_queued_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::new(1).unwrap();
            for _ in 0..16 {
                let counter = Arc::clone(&counter);
                pool.submit(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap();
            }
            // Dropped without wait(): remaining tasks drain before join.
        }
        assert_eq!(counter.load(Ordering::Relaxed), 16);
    }

    #[test]
    fn panicking_task_does_not_wedge_the_pool() {
        let pool = WorkerPool::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        pool.submit(|| panic!("boom")).unwrap();
        let after = Arc::clone(&counter);
        pool.submit(move || {
            after.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        pool.wait();

        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
