//! Persisted progress records for interrupted large-file copies.
//!
//! A record is written when a chunked copy fails or is interrupted,
//! consulted on the next run, and deleted once its file completes. The
//! on-disk form is a small TOML document at a well-known relative path.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{CopyError, ErrorKind, Result};

/// Default location of the resume record, relative to the working directory.
pub const DEFAULT_RESUME_PATH: &str = ".cclone.resume";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeInfo {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub copied_bytes: u64,
    pub total_bytes: u64,
    #[serde(default)]
    pub completed_chunks: Vec<u32>,
}

/// Load a resume record. A missing file means "no resume state"; a
/// malformed file is logged and treated the same way.
pub fn load_resume_info(path: &Path) -> Result<Option<ResumeInfo>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CopyError::io(
                format!("read resume record {}", path.display()),
                &e,
            ))
        }
    };

    match toml::from_str(&text) {
        Ok(info) => Ok(Some(info)),
        Err(e) => {
            log::warn!("ignoring malformed resume record {}: {e}", path.display());
            Ok(None)
        }
    }
}

/// Write a resume record atomically: serialize to a sibling temp file,
/// then rename over the final path.
pub fn save_resume_info(info: &ResumeInfo, path: &Path) -> Result<()> {
    let text = toml::to_string(info).map_err(|e| {
        CopyError::new(
            ErrorKind::Unknown,
            format!("serialize resume record: {e}"),
        )
    })?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, text)
        .map_err(|e| CopyError::io(format!("write resume record {}", tmp.display()), &e))?;
    fs::rename(&tmp, path)
        .map_err(|e| CopyError::io(format!("commit resume record {}", path.display()), &e))?;
    Ok(())
}

/// Delete a resume record if it refers to the given source/destination
/// pair. Best-effort; called when a file completes successfully.
pub fn clear_resume_info(path: &Path, src: &Path, dst: &Path) {
    match load_resume_info(path) {
        Ok(Some(info)) if info.source == src && info.destination == dst => {
            if let Err(e) = fs::remove_file(path) {
                log::warn!("could not remove resume record {}: {e}", path.display());
            }
        }
        Ok(_) => {}
        Err(e) => log::warn!("could not inspect resume record: {e}"),
    }
}

/// A destination is resumable when it exists and is strictly smaller
/// than the source.
pub fn should_resume(src: &Path, dst: &Path) -> bool {
    let Ok(dst_md) = fs::metadata(dst) else {
        return false;
    };
    let Ok(src_md) = fs::metadata(src) else {
        return false;
    };
    dst_md.len() < src_md.len()
}
