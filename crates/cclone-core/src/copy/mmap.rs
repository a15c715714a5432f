//! Memory-mapped copy: map the source read-only, write it out in one call.

use std::path::Path;

use crate::errors::Result;

#[cfg(unix)]
pub fn copy_mmap(src: &Path, dst: &Path) -> Result<()> {
    use std::fs::File;
    use std::io::Write;

    use memmap2::Mmap;

    use crate::errors::CopyError;

    let src_file =
        File::open(src).map_err(|e| CopyError::io(format!("open {}", src.display()), &e))?;
    let len = src_file
        .metadata()
        .map_err(|e| CopyError::io(format!("stat {}", src.display()), &e))?
        .len();

    // Empty files cannot be mapped.
    if len == 0 {
        File::create(dst).map_err(|e| CopyError::io(format!("create {}", dst.display()), &e))?;
        return Ok(());
    }

    // SAFETY: the file is held open for the lifetime of the mapping and
    // is only read through it.
    let map = unsafe { Mmap::map(&src_file) }
        .map_err(|e| CopyError::io(format!("mmap {}", src.display()), &e))?;

    let mut dst_file =
        File::create(dst).map_err(|e| CopyError::io(format!("create {}", dst.display()), &e))?;
    dst_file
        .write_all(&map)
        .map_err(|e| CopyError::io(format!("write {}", dst.display()), &e))?;
    Ok(())
}

/// Without POSIX mmap semantics, degrade to the buffered path.
#[cfg(not(unix))]
pub fn copy_mmap(src: &Path, dst: &Path) -> Result<()> {
    super::copy_buffered(src, dst)
}
