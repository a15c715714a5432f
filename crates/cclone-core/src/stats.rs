//! Shared run statistics.
//!
//! Counters are updated with relaxed ordering from many workers; a
//! consistent snapshot is only taken after all workers have joined.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CopyStats {
    files_copied: AtomicU64,
    bytes_copied: AtomicU64,
    files_skipped: AtomicU64,
    errors: AtomicU64,
}

impl CopyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_copied(&self, bytes: u64) {
        self.files_copied.fetch_add(1, Ordering::Relaxed);
        self.bytes_copied.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters. Only consistent once every contributing worker
    /// has been joined.
    pub fn snapshot(&self) -> CopyStatsSnapshot {
        CopyStatsSnapshot {
            files_copied: self.files_copied.load(Ordering::Relaxed),
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// End-of-run view of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStatsSnapshot {
    pub files_copied: u64,
    pub bytes_copied: u64,
    pub files_skipped: u64,
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn concurrent_updates_are_not_lost() {
        let stats = Arc::new(CopyStats::new());
        let workers = 8;
        let per_worker = 1000u64;

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..per_worker {
                        stats.record_copied(3);
                        stats.record_skipped();
                        stats.record_error();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = stats.snapshot();
        assert_eq!(snap.files_copied, workers * per_worker);
        assert_eq!(snap.bytes_copied, workers * per_worker * 3);
        assert_eq!(snap.files_skipped, workers * per_worker);
        assert_eq!(snap.errors, workers * per_worker);
    }
}
