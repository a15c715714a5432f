//! Run orchestration: enumerate, filter, dispatch, aggregate.
//!
//! A run owns one worker pool. Per-file tasks are independent; a task's
//! failure increments the error counter and the run continues. The run
//! itself only fails when the destination cannot be created or when an
//! interrupt is observed after the pool drains.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::copy::{
    chunked_copy_file, copy_with_strategy, select_strategy, ChunkedCopyOptions,
    LARGE_FILE_THRESHOLD,
};
use crate::enumeration::{enumerate_sources, CopyJob};
use crate::errors::{log_and_return, CopyError, ErrorKind, Result};
use crate::hash::verify_files;
use crate::interrupt;
use crate::metadata::copy_metadata;
use crate::pool::WorkerPool;
use crate::progress::ProgressSink;
use crate::resume;
use crate::retry::{with_retry, RetryPolicy};
use crate::stats::{CopyStats, CopyStatsSnapshot};

pub struct CopyEngine {
    config: Arc<Config>,
    monitor: Arc<dyn ProgressSink>,
    resume_path: PathBuf,
}

enum FileOutcome {
    Copied(u64),
    Skipped,
}

impl CopyEngine {
    pub fn new(config: Arc<Config>, monitor: Arc<dyn ProgressSink>) -> Self {
        Self {
            config,
            monitor,
            resume_path: PathBuf::from(resume::DEFAULT_RESUME_PATH),
        }
    }

    /// Use a different resume-record location (default: `.cclone.resume`
    /// in the working directory).
    pub fn with_resume_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.resume_path = path.into();
        self
    }

    pub fn run(&self, sources: &[PathBuf], destination: &Path) -> Result<CopyStatsSnapshot> {
        if !destination.exists() {
            fs::create_dir_all(destination).map_err(|e| {
                log_and_return(CopyError::new(
                    ErrorKind::PermissionDenied,
                    format!("cannot create destination {}: {e}", destination.display()),
                ))
            })?;
        }

        let enumeration = enumerate_sources(&self.config, sources, destination);
        let stats = Arc::new(CopyStats::new());
        for _ in 0..enumeration.filtered {
            stats.record_skipped();
        }

        self.monitor
            .set_total(enumeration.jobs.len() as u64, enumeration.total_bytes());

        let pool = WorkerPool::new(self.config.effective_threads())?;
        for job in enumeration.jobs {
            let config = Arc::clone(&self.config);
            let monitor = Arc::clone(&self.monitor);
            let stats = Arc::clone(&stats);
            let resume_path = self.resume_path.clone();

            pool.submit(move || {
                if interrupt::is_set() {
                    return;
                }
                let size = job.size;
                match process_file(&config, &job, &resume_path) {
                    Ok(FileOutcome::Copied(bytes)) => {
                        stats.record_copied(bytes);
                        monitor.update(1, bytes);
                    }
                    Ok(FileOutcome::Skipped) => {
                        stats.record_skipped();
                        monitor.update(1, size);
                    }
                    Err(err) => {
                        stats.record_error();
                        monitor.update(1, 0);
                        let _ = log_and_return(err);
                    }
                }
            })?;
        }
        pool.wait();
        // Joining the workers establishes the happens-before needed for a
        // consistent snapshot.
        drop(pool);

        if interrupt::is_set() {
            return Err(log_and_return(CopyError::new(
                ErrorKind::Interrupted,
                "run interrupted",
            )));
        }
        Ok(stats.snapshot())
    }
}

fn process_file(config: &Config, job: &CopyJob, resume_path: &Path) -> Result<FileOutcome> {
    let src = &job.source_path;
    let dst = &job.dest_path;

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                CopyError::new(
                    ErrorKind::PermissionDenied,
                    format!("cannot create directory {}: {e}", parent.display()),
                )
            })?;
        }
    }

    let size = fs::metadata(src)
        .map_err(|e| CopyError::io(format!("stat {}", src.display()), &e))?
        .len();

    if dst.exists() {
        if config.resume {
            let dst_size = fs::metadata(dst)
                .map_err(|e| CopyError::io(format!("stat {}", dst.display()), &e))?
                .len();
            if dst_size == size {
                log::debug!("skipping {} (destination complete)", dst.display());
                resume::clear_resume_info(resume_path, src, dst);
                return Ok(FileOutcome::Skipped);
            }
            // Partial transfers restart from offset zero.
            log::debug!("destination {} is partial; recopying", dst.display());
        }
        fs::remove_file(dst).map_err(|e| {
            CopyError::new(
                ErrorKind::PermissionDenied,
                format!("cannot remove existing file {}: {e}", dst.display()),
            )
        })?;
    }

    let retry = RetryPolicy::default();
    with_retry(
        || {
            if size > LARGE_FILE_THRESHOLD {
                let opts = ChunkedCopyOptions {
                    chunk_size: config.effective_buffer_size(),
                    threads: config.effective_threads(),
                    resume: config.resume,
                    resume_path: resume_path.to_path_buf(),
                };
                chunked_copy_file(src, dst, &opts).map(|_| ())
            } else {
                copy_with_strategy(src, dst, select_strategy(size))
            }
        },
        &retry,
    )?;

    if config.verify {
        let equal = with_retry(|| verify_files(src, dst), &retry)?;
        if !equal {
            return Err(CopyError::new(
                ErrorKind::ChecksumMismatch,
                format!("content digest mismatch for {}", dst.display()),
            ));
        }
    }

    if config.preserve_metadata {
        copy_metadata(src, dst);
    }

    if config.resume {
        resume::clear_resume_info(resume_path, src, dst);
    }

    Ok(FileOutcome::Copied(size))
}
