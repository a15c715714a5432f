//! Streamed copy through a small fixed buffer.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::errors::{CopyError, Result};

const BUFFER_SIZE: usize = 64 * 1024;

pub fn copy_buffered(src: &Path, dst: &Path) -> Result<()> {
    let mut src_file =
        File::open(src).map_err(|e| CopyError::io(format!("open {}", src.display()), &e))?;
    let mut dst_file =
        File::create(dst).map_err(|e| CopyError::io(format!("create {}", dst.display()), &e))?;

    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        let n = src_file
            .read(&mut buf)
            .map_err(|e| CopyError::io(format!("read {}", src.display()), &e))?;
        if n == 0 {
            break;
        }
        dst_file
            .write_all(&buf[..n])
            .map_err(|e| CopyError::io(format!("write {}", dst.display()), &e))?;
    }
    Ok(())
}
