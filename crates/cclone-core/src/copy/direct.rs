//! Unbuffered copy through O_DIRECT with page-aligned buffers.
//!
//! Reads stream through a 4 MiB buffer aligned to 4 KiB; write lengths
//! are rounded up to the alignment and the destination is truncated back
//! to the true size afterwards. When the filesystem refuses the direct
//! flag, the copy transparently degrades to the buffered path.

use std::path::Path;

use crate::errors::Result;

use super::copy_buffered;

#[cfg(target_os = "linux")]
pub(crate) const DIRECT_CHUNK_SIZE: usize = 4 * 1024 * 1024;
#[cfg(target_os = "linux")]
pub(crate) const DIRECT_ALIGNMENT: usize = 4096;

#[cfg(target_os = "linux")]
pub(crate) fn round_up(len: usize, alignment: usize) -> usize {
    len.div_ceil(alignment) * alignment
}

/// Heap buffer aligned for O_DIRECT transfers.
#[cfg(target_os = "linux")]
pub(crate) struct AlignedBuf {
    ptr: *mut u8,
    layout: std::alloc::Layout,
}

#[cfg(target_os = "linux")]
impl AlignedBuf {
    pub(crate) fn new(len: usize) -> Self {
        let layout = std::alloc::Layout::from_size_align(len, DIRECT_ALIGNMENT)
            .expect("alignment is a nonzero power of two");
        // SAFETY: layout has nonzero size; allocation failure aborts.
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            std::alloc::handle_alloc_error(layout);
        }
        Self { ptr, layout }
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for layout.size() bytes for the life of self.
        unsafe { std::slice::from_raw_parts(self.ptr, self.layout.size()) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and we hold the unique reference.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.layout.size()) }
    }
}

#[cfg(target_os = "linux")]
impl Drop for AlignedBuf {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with this layout.
        unsafe { std::alloc::dealloc(self.ptr, self.layout) };
    }
}

// The buffer is only ever owned by one task at a time.
#[cfg(target_os = "linux")]
unsafe impl Send for AlignedBuf {}

#[cfg(target_os = "linux")]
pub(crate) fn open_direct_read(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_DIRECT)
        .open(path)
}

#[cfg(target_os = "linux")]
pub(crate) fn open_direct_write(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .custom_flags(libc::O_DIRECT)
        .open(path)
}

/// Open an existing destination for positioned direct writes without
/// truncating it (the chunked path pre-allocates the file).
#[cfg(target_os = "linux")]
pub(crate) fn open_direct_rw(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_DIRECT)
        .open(path)
}

/// Read until the buffer is full or EOF.
#[cfg(target_os = "linux")]
pub(crate) fn read_full(file: &mut std::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    use std::io::Read;

    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(target_os = "linux")]
pub fn copy_direct(src: &Path, dst: &Path) -> Result<()> {
    use std::io::Write;

    use crate::errors::CopyError;

    let mut src_file = match open_direct_read(src) {
        Ok(file) => file,
        Err(e) => {
            log::debug!(
                "direct open of {} refused ({e}); using buffered copy",
                src.display()
            );
            return copy_buffered(src, dst);
        }
    };
    let mut dst_file = match open_direct_write(dst) {
        Ok(file) => file,
        Err(e) => {
            log::debug!(
                "direct open of {} refused ({e}); using buffered copy",
                dst.display()
            );
            return copy_buffered(src, dst);
        }
    };

    let size = src_file
        .metadata()
        .map_err(|e| CopyError::io(format!("stat {}", src.display()), &e))?
        .len();

    let mut buf = AlignedBuf::new(DIRECT_CHUNK_SIZE);
    loop {
        let n = read_full(&mut src_file, buf.as_mut_slice())
            .map_err(|e| CopyError::io(format!("read {}", src.display()), &e))?;
        if n == 0 {
            break;
        }
        // Only the tail read can be short; pad its write out to the
        // alignment and trim below.
        let aligned = round_up(n, DIRECT_ALIGNMENT).min(DIRECT_CHUNK_SIZE);
        buf.as_mut_slice()[n..aligned].fill(0);
        dst_file
            .write_all(&buf.as_slice()[..aligned])
            .map_err(|e| CopyError::io(format!("write {}", dst.display()), &e))?;
    }

    dst_file
        .set_len(size)
        .map_err(|e| CopyError::io(format!("truncate {}", dst.display()), &e))?;
    Ok(())
}

/// O_DIRECT is Linux-specific; elsewhere the direct strategy degrades to
/// the buffered path.
#[cfg(not(target_os = "linux"))]
pub fn copy_direct(src: &Path, dst: &Path) -> Result<()> {
    copy_buffered(src, dst)
}

/// Direct copy dispatched through io_uring: a bounded ring with one
/// read/write pair in flight, each submission paired with its completion
/// before the next, preserving write order.
#[cfg(all(target_os = "linux", feature = "io_uring"))]
pub(crate) fn copy_direct_uring(src: &Path, dst: &Path) -> Result<()> {
    use io_uring::{opcode, types, IoUring};

    use crate::errors::{CopyError, ErrorKind};
    use crate::interrupt;
    use std::os::unix::io::AsRawFd;

    const RING_DEPTH: u32 = 64;

    let mut ring = match IoUring::new(RING_DEPTH) {
        Ok(ring) => ring,
        Err(e) => {
            log::debug!("io_uring unavailable ({e}); using synchronous direct copy");
            return copy_direct(src, dst);
        }
    };

    let src_file = match open_direct_read(src) {
        Ok(file) => file,
        Err(_) => return copy_direct(src, dst),
    };
    let dst_file = match open_direct_write(dst) {
        Ok(file) => file,
        Err(_) => return copy_direct(src, dst),
    };

    let size = src_file
        .metadata()
        .map_err(|e| CopyError::io(format!("stat {}", src.display()), &e))?
        .len();
    let src_fd = types::Fd(src_file.as_raw_fd());
    let dst_fd = types::Fd(dst_file.as_raw_fd());

    let mut buf = AlignedBuf::new(DIRECT_CHUNK_SIZE);
    let mut offset = 0u64;

    while offset < size {
        if interrupt::is_set() {
            return Err(CopyError::new(
                ErrorKind::Interrupted,
                "interrupted during direct copy",
            ));
        }

        // Fill the whole buffer before writing so a short read cannot
        // desynchronize the aligned write offsets.
        let mut n = 0usize;
        while n < DIRECT_CHUNK_SIZE {
            let read_sqe = opcode::Read::new(
                src_fd,
                // SAFETY: n stays within the buffer.
                unsafe { buf.as_mut_slice().as_mut_ptr().add(n) },
                (DIRECT_CHUNK_SIZE - n) as u32,
            )
            .offset(offset + n as u64)
            .build();
            let got = submit_one(&mut ring, &read_sqe)
                .map_err(|e| CopyError::io(format!("uring read {}", src.display()), &e))?;
            if got == 0 {
                break;
            }
            n += got;
        }
        if n == 0 {
            break;
        }

        let aligned = round_up(n, DIRECT_ALIGNMENT).min(DIRECT_CHUNK_SIZE);
        buf.as_mut_slice()[n..aligned].fill(0);

        let write_sqe = opcode::Write::new(dst_fd, buf.as_slice().as_ptr(), aligned as u32)
            .offset(offset)
            .build();
        let written = submit_one(&mut ring, &write_sqe)
            .map_err(|e| CopyError::io(format!("uring write {}", dst.display()), &e))?;
        if written != aligned {
            return Err(CopyError::new(
                ErrorKind::Unknown,
                format!("short uring write to {} ({written} of {aligned})", dst.display()),
            ));
        }

        offset += n as u64;
    }

    dst_file
        .set_len(size)
        .map_err(|e| CopyError::io(format!("truncate {}", dst.display()), &e))?;
    Ok(())
}

/// Push a single SQE, wait for its completion, and return the byte count.
#[cfg(all(target_os = "linux", feature = "io_uring"))]
fn submit_one(
    ring: &mut io_uring::IoUring,
    sqe: &io_uring::squeue::Entry,
) -> std::io::Result<usize> {
    // SAFETY: the buffer behind the SQE outlives the paired completion,
    // which we reap before returning.
    unsafe {
        ring.submission()
            .push(sqe)
            .map_err(|_| std::io::Error::other("submission queue full"))?;
    }
    ring.submit_and_wait(1)?;
    let cqe = ring
        .completion()
        .next()
        .ok_or_else(|| std::io::Error::other("missing completion"))?;
    let res = cqe.result();
    if res < 0 {
        return Err(std::io::Error::from_raw_os_error(-res));
    }
    Ok(res as usize)
}
