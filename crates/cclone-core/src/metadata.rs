//! Best-effort replication of file metadata.
//!
//! Copies the source mtime and, on POSIX, permission bits. Failures are
//! logged and never change the outcome of the copy job.

use std::fs;
use std::path::Path;

use filetime::FileTime;

pub fn copy_metadata(src: &Path, dst: &Path) {
    let md = match fs::metadata(src) {
        Ok(md) => md,
        Err(e) => {
            log::warn!("could not read metadata of {}: {e}", src.display());
            return;
        }
    };

    match md.modified() {
        Ok(modified) => {
            let mtime = FileTime::from_system_time(modified);
            if let Err(e) = filetime::set_file_mtime(dst, mtime) {
                log::warn!("could not preserve mtime for {}: {e}", dst.display());
            }
        }
        Err(e) => {
            log::warn!("mtime unavailable for {}: {e}", src.display());
        }
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = md.permissions().mode();
        if let Err(e) = fs::set_permissions(dst, fs::Permissions::from_mode(mode)) {
            log::warn!("could not preserve permissions for {}: {e}", dst.display());
        }
    }
}
