//! Content verification via streaming XXH64 digests.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use xxhash_rust::xxh64::Xxh64;

use crate::errors::{CopyError, Result};

const HASH_BLOCK_SIZE: usize = 4 * 1024 * 1024;
const HASH_SEED: u64 = 0;

/// Digest a whole file by streaming fixed-size blocks.
pub fn hash_file(path: &Path) -> Result<u64> {
    let mut file =
        File::open(path).map_err(|e| CopyError::io(format!("open {} for hashing", path.display()), &e))?;

    let mut state = Xxh64::new(HASH_SEED);
    let mut buf = vec![0u8; HASH_BLOCK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| CopyError::io(format!("read {} for hashing", path.display()), &e))?;
        if n == 0 {
            break;
        }
        state.update(&buf[..n]);
    }
    Ok(state.digest())
}

/// Digest both files and report whether their contents are equal.
/// A mismatch is a boolean outcome, not an error; I/O failures are errors.
pub fn verify_files(src: &Path, dst: &Path) -> Result<bool> {
    let src_digest = hash_file(src)?;
    let dst_digest = hash_file(dst)?;
    Ok(src_digest == dst_digest)
}
