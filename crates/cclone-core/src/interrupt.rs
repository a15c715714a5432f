//! Process-wide cooperative cancellation.
//!
//! The flag is set once by the signal handler and never cleared; long
//! operations poll [`is_set`] and translate an observation into an
//! `Interrupted` error so cleanup can record resume state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

static INTERRUPTED: Lazy<Arc<AtomicBool>> = Lazy::new(|| Arc::new(AtomicBool::new(false)));

/// Mark the process as interrupted. Sticky for the life of the process.
pub fn raise() {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

/// Whether an interrupt has been observed. Relaxed load; eventual
/// visibility is sufficient for cancellation.
pub fn is_set() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Register SIGINT/SIGTERM handlers that raise the flag.
#[cfg(unix)]
pub fn install_handler() -> std::io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};

    signal_hook::flag::register(SIGINT, Arc::clone(&INTERRUPTED))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&INTERRUPTED))?;
    Ok(())
}

/// No-op installer for platforms without Unix signals; the flag can still
/// be raised programmatically.
#[cfg(not(unix))]
pub fn install_handler() -> std::io::Result<()> {
    Ok(())
}
