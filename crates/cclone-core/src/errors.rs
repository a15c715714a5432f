//! Failure kinds and classification for copy operations.
//!
//! Every fallible engine operation returns a [`CopyError`] carrying a kind,
//! a message, and the capture site. Kinds classify three ways:
//! - Fatal: the per-file task stops (missing file, permissions, bad path)
//! - Transient: the retry helper may re-attempt (locked file, timeout)
//! - Neither: surfaced per file, never retried implicitly

use std::fmt;
use std::io;
use std::panic::Location;

/// Category of a copy failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FileNotFound,
    PermissionDenied,
    InvalidPath,
    UnsupportedFeature,
    DiskFull,
    FileLocked,
    ChecksumMismatch,
    Interrupted,
    Unknown,
    NetworkTimeout,
}

impl ErrorKind {
    /// Fatal kinds terminate the per-file task; a run whose outcome they
    /// become maps to exit code 1.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::FileNotFound
                | ErrorKind::PermissionDenied
                | ErrorKind::InvalidPath
                | ErrorKind::UnsupportedFeature
        )
    }

    /// Transient kinds are eligible for retry with backoff.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::FileLocked | ErrorKind::NetworkTimeout)
    }
}

/// A copy failure with its kind, message, and capture site.
#[derive(Debug, Clone)]
pub struct CopyError {
    pub kind: ErrorKind,
    pub message: String,
    pub file: &'static str,
    pub line: u32,
}

impl CopyError {
    /// Create an error, recording the caller's file and line.
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let loc = Location::caller();
        Self {
            kind,
            message: message.into(),
            file: loc.file(),
            line: loc.line(),
        }
    }

    /// Wrap an I/O error, deriving the kind from the OS error.
    #[track_caller]
    pub fn io(context: impl fmt::Display, err: &io::Error) -> Self {
        Self::new(categorize_io_error(err), format!("{context}: {err}"))
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Process exit code when this error is the run's outcome.
    pub fn exit_code(&self) -> i32 {
        if self.is_fatal() {
            return 1;
        }
        match self.kind {
            ErrorKind::DiskFull => 20,
            ErrorKind::FileLocked => 21,
            ErrorKind::ChecksumMismatch => 22,
            ErrorKind::Interrupted => 130,
            _ => 1,
        }
    }
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CopyError {}

/// Result type for copy operations.
pub type Result<T> = std::result::Result<T, CopyError>;

/// Log a surfaced error at the level its kind warrants, then hand it back.
/// Called as the final step before returning an error upward.
pub fn log_and_return(err: CopyError) -> CopyError {
    if err.is_fatal() {
        log::error!("[{}:{}] {:?}: {}", err.file, err.line, err.kind, err.message);
    } else {
        log::warn!("[{}:{}] {:?}: {}", err.file, err.line, err.kind, err.message);
    }
    err
}

/// Map an I/O error onto the failure taxonomy. Raw OS errors are checked
/// first so DiskFull and FileLocked survive the `io::ErrorKind` funnel.
pub fn categorize_io_error(err: &io::Error) -> ErrorKind {
    #[cfg(unix)]
    if let Some(code) = err.raw_os_error() {
        match code {
            libc::ENOSPC | libc::EDQUOT => return ErrorKind::DiskFull,
            libc::EBUSY | libc::EAGAIN | libc::ETXTBSY => return ErrorKind::FileLocked,
            _ => {}
        }
    }

    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::FileNotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        io::ErrorKind::TimedOut => ErrorKind::NetworkTimeout,
        io::ErrorKind::WouldBlock => ErrorKind::FileLocked,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => ErrorKind::InvalidPath,
        _ => ErrorKind::Unknown,
    }
}
