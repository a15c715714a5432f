//! File-copy strategies.
//!
//! `select_strategy` is a pure function of file size; each strategy arm
//! handles its own platform fallback. The async wrapper runs any strategy
//! on a detached task and hands back a joinable handle.

mod buffered;
mod chunked;
mod direct;
mod mmap;

pub use buffered::copy_buffered;
pub use chunked::{chunked_copy_file, ChunkedCopyOptions};
pub use direct::copy_direct;
pub use mmap::copy_mmap;

use std::path::Path;
use std::thread::JoinHandle;

use crate::errors::{CopyError, ErrorKind, Result};
use crate::interrupt;

/// Files below this are streamed through a small buffer.
pub const SMALL_FILE_LIMIT: u64 = 1_000_000;
/// Files at or above this take the direct-I/O (and possibly chunked) path.
pub const LARGE_FILE_THRESHOLD: u64 = 100_000_000;
/// Default chunk size for large-file copies.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// I/O mechanism for copying one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStrategy {
    Buffered,
    MMap,
    DirectIO,
    Async,
}

/// Pick a strategy from the file size alone.
pub fn select_strategy(file_size: u64) -> CopyStrategy {
    if file_size < SMALL_FILE_LIMIT {
        CopyStrategy::Buffered
    } else if file_size < LARGE_FILE_THRESHOLD {
        CopyStrategy::MMap
    } else {
        CopyStrategy::DirectIO
    }
}

/// Copy `src` to `dst` with the given strategy. The destination path is
/// presumed writable; any prior destination has been handled by the
/// engine's pre-step.
pub fn copy_with_strategy(src: &Path, dst: &Path, strategy: CopyStrategy) -> Result<()> {
    if interrupt::is_set() {
        return Err(CopyError::new(
            ErrorKind::Interrupted,
            format!("copy of {} cancelled", src.display()),
        ));
    }
    match strategy {
        CopyStrategy::Buffered => copy_buffered(src, dst),
        CopyStrategy::MMap => copy_mmap(src, dst),
        CopyStrategy::DirectIO => copy_direct(src, dst),
        CopyStrategy::Async => {
            let size = std::fs::metadata(src)
                .map_err(|e| CopyError::io(format!("stat {}", src.display()), &e))?
                .len();
            copy_file_async(src, dst, select_strategy(size)).join()
        }
    }
}

/// Handle to a copy running on a detached task.
pub struct AsyncCopyHandle {
    handle: JoinHandle<Result<()>>,
}

impl AsyncCopyHandle {
    /// Block until the copy finishes and return its outcome.
    pub fn join(self) -> Result<()> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(CopyError::new(ErrorKind::Unknown, "copy task panicked")),
        }
    }
}

/// Submit a copy on its own task, independent of the engine's pool.
/// With the `io_uring` feature, direct-I/O requests go through the
/// kernel completion queue when available.
pub fn copy_file_async(src: &Path, dst: &Path, strategy: CopyStrategy) -> AsyncCopyHandle {
    let src = src.to_path_buf();
    let dst = dst.to_path_buf();
    let handle = std::thread::spawn(move || {
        if interrupt::is_set() {
            return Err(CopyError::new(
                ErrorKind::Interrupted,
                "copy cancelled before start",
            ));
        }

        #[cfg(all(target_os = "linux", feature = "io_uring"))]
        if strategy == CopyStrategy::DirectIO {
            return direct::copy_direct_uring(&src, &dst);
        }

        copy_with_strategy(&src, &dst, strategy)
    });
    AsyncCopyHandle { handle }
}
