//! Parallel, offset-partitioned copy of a single large file.
//!
//! The file is split into aligned chunks copied by independent tasks on a
//! dedicated pool; each task opens its own descriptors and writes only its
//! byte range. On failure or interrupt the completed-chunk set is
//! persisted for resume and the partial destination is deleted.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::{log_and_return, CopyError, ErrorKind, Result};
use crate::interrupt;
use crate::pool::WorkerPool;
use crate::resume::{save_resume_info, ResumeInfo, DEFAULT_RESUME_PATH};

use super::{copy_file_async, CopyStrategy, DEFAULT_CHUNK_SIZE};

#[derive(Debug, Clone)]
pub struct ChunkedCopyOptions {
    /// Requested chunk size; floored to a 4 KiB multiple for direct I/O.
    pub chunk_size: usize,
    pub threads: usize,
    /// Persist a resume record when the copy fails or is interrupted.
    pub resume: bool,
    pub resume_path: PathBuf,
}

impl Default for ChunkedCopyOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            threads: num_cpus::get().max(1),
            resume: false,
            resume_path: PathBuf::from(DEFAULT_RESUME_PATH),
        }
    }
}

pub fn chunked_copy_file(src: &Path, dst: &Path, opts: &ChunkedCopyOptions) -> Result<u64> {
    let size = fs::metadata(src)
        .map_err(|e| CopyError::io(format!("stat {}", src.display()), &e))?
        .len();

    // Keep chunk offsets 4 KiB-aligned so the direct path stays legal.
    let chunk_size = (opts.chunk_size.max(4096) / 4096 * 4096) as u64;
    let num_chunks = size.div_ceil(chunk_size).max(1);

    if opts.threads <= 1 || num_chunks <= 1 {
        copy_file_async(src, dst, CopyStrategy::DirectIO).join()?;
        return Ok(size);
    }

    // Pre-allocate the destination to its full size.
    {
        let mut dst_file = File::create(dst)
            .map_err(|e| CopyError::io(format!("create {}", dst.display()), &e))?;
        dst_file
            .seek(SeekFrom::Start(size - 1))
            .map_err(|e| CopyError::io(format!("preallocate {}", dst.display()), &e))?;
        dst_file
            .write_all(&[0])
            .map_err(|e| CopyError::io(format!("preallocate {}", dst.display()), &e))?;
    }

    let completed: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
    let bytes_copied = Arc::new(AtomicU64::new(0));
    let first_error: Arc<Mutex<Option<CopyError>>> = Arc::new(Mutex::new(None));

    let pool = WorkerPool::new(opts.threads)?;
    for index in 0..num_chunks {
        let offset = index * chunk_size;
        let len = chunk_size.min(size - offset);
        let src = src.to_path_buf();
        let dst = dst.to_path_buf();
        let completed = Arc::clone(&completed);
        let bytes_copied = Arc::clone(&bytes_copied);
        let first_error = Arc::clone(&first_error);
        let first_error_for_submit = Arc::clone(&first_error);

        let submitted = pool.submit(move || {
            if interrupt::is_set() {
                record_error(
                    &first_error,
                    CopyError::new(ErrorKind::Interrupted, "interrupted during chunked copy"),
                );
                return;
            }
            match copy_chunk(&src, &dst, offset, len) {
                Ok(()) => {
                    completed.lock().push(index as u32);
                    bytes_copied.fetch_add(len, Ordering::Relaxed);
                }
                Err(err) => record_error(&first_error, err),
            }
        });
        if let Err(err) = submitted {
            record_error(&first_error_for_submit, err);
            break;
        }
    }
    pool.wait();
    drop(pool);

    let mut failure = first_error.lock().take();
    if failure.is_none() && interrupt::is_set() {
        failure = Some(CopyError::new(
            ErrorKind::Interrupted,
            format!("interrupted while copying {}", dst.display()),
        ));
    }

    if let Some(err) = failure {
        if opts.resume {
            let mut chunks = completed.lock().clone();
            chunks.sort_unstable();
            let info = ResumeInfo {
                source: src.to_path_buf(),
                destination: dst.to_path_buf(),
                copied_bytes: bytes_copied.load(Ordering::Relaxed),
                total_bytes: size,
                completed_chunks: chunks,
            };
            if let Err(save_err) = save_resume_info(&info, &opts.resume_path) {
                log::warn!("could not save resume record: {save_err}");
            }
        }
        if let Err(remove_err) = fs::remove_file(dst) {
            log::warn!(
                "could not remove partial destination {}: {remove_err}",
                dst.display()
            );
        }
        return Err(log_and_return(err));
    }

    // Trim any direct-I/O alignment padding past the true size.
    let dst_file = OpenOptions::new()
        .write(true)
        .open(dst)
        .map_err(|e| CopyError::io(format!("open {}", dst.display()), &e))?;
    dst_file
        .set_len(size)
        .map_err(|e| CopyError::io(format!("truncate {}", dst.display()), &e))?;

    Ok(size)
}

fn record_error(slot: &Mutex<Option<CopyError>>, err: CopyError) {
    let mut guard = slot.lock();
    if guard.is_none() {
        *guard = Some(err);
    } else {
        log::debug!("additional chunk failure: {err}");
    }
}

/// Copy one byte range. Tries direct I/O first and falls back to plain
/// positioned reads and writes.
fn copy_chunk(src: &Path, dst: &Path, offset: u64, len: u64) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        use super::direct::{open_direct_read, open_direct_rw};

        if let (Ok(src_file), Ok(dst_file)) = (open_direct_read(src), open_direct_rw(dst)) {
            match direct_chunk(src_file, dst_file, offset, len) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::debug!(
                        "direct chunk at {offset} failed ({e}); retrying buffered"
                    );
                }
            }
        }
    }
    plain_chunk(src, dst, offset, len)
}

#[cfg(target_os = "linux")]
fn direct_chunk(
    mut src_file: File,
    mut dst_file: File,
    offset: u64,
    len: u64,
) -> std::io::Result<()> {
    use super::direct::{read_full, round_up, AlignedBuf, DIRECT_ALIGNMENT};

    let len = len as usize;
    let aligned = round_up(len, DIRECT_ALIGNMENT);
    let mut buf = AlignedBuf::new(aligned);

    src_file.seek(SeekFrom::Start(offset))?;
    let n = read_full(&mut src_file, buf.as_mut_slice())?;
    if n < len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "source shrank during chunked copy",
        ));
    }
    // Write length must stay aligned; the padding is trimmed once every
    // chunk has completed.
    buf.as_mut_slice()[len..aligned].fill(0);

    dst_file.seek(SeekFrom::Start(offset))?;
    dst_file.write_all(&buf.as_slice()[..aligned])?;
    Ok(())
}

fn plain_chunk(src: &Path, dst: &Path, offset: u64, len: u64) -> Result<()> {
    use std::io::Read;

    let mut src_file =
        File::open(src).map_err(|e| CopyError::io(format!("open {}", src.display()), &e))?;
    src_file
        .seek(SeekFrom::Start(offset))
        .map_err(|e| CopyError::io(format!("seek {}", src.display()), &e))?;
    let mut buf = vec![0u8; len as usize];
    src_file
        .read_exact(&mut buf)
        .map_err(|e| CopyError::io(format!("read chunk at {offset} of {}", src.display()), &e))?;

    let mut dst_file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(dst)
        .map_err(|e| CopyError::io(format!("open {}", dst.display()), &e))?;
    dst_file
        .seek(SeekFrom::Start(offset))
        .map_err(|e| CopyError::io(format!("seek {}", dst.display()), &e))?;
    dst_file
        .write_all(&buf)
        .map_err(|e| CopyError::io(format!("write chunk at {offset} of {}", dst.display()), &e))?;
    Ok(())
}
