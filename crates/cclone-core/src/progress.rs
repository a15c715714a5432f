//! Progress accounting and terminal rendering.
//!
//! Counters update lock-free; the render thread reads atomics only and
//! may observe partially-updated snapshots, which is acceptable for a
//! progress line.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const RENDER_INTERVAL: Duration = Duration::from_millis(100);
const BAR_WIDTH: usize = 20;

/// Thread-safe progress collaborator held by the engine for a run.
pub trait ProgressSink: Send + Sync {
    fn set_total(&self, files: u64, bytes: u64);
    fn update(&self, delta_files: u64, delta_bytes: u64);
}

/// Sink that discards all updates.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn set_total(&self, _files: u64, _bytes: u64) {}
    fn update(&self, _delta_files: u64, _delta_bytes: u64) {}
}

struct MonitorShared {
    total_files: AtomicU64,
    total_bytes: AtomicU64,
    processed_files: AtomicU64,
    processed_bytes: AtomicU64,
    start: Instant,
    shutdown: AtomicBool,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot {
    pub total_files: u64,
    pub total_bytes: u64,
    pub processed_files: u64,
    pub processed_bytes: u64,
}

/// Progress monitor with an optional background renderer that redraws a
/// single terminal line every ~100 ms. When quiet, rendering is disabled
/// but counters continue to update.
pub struct ProgressMonitor {
    shared: Arc<MonitorShared>,
    render_thread: Option<JoinHandle<()>>,
    enabled: bool,
}

impl ProgressMonitor {
    pub fn new(enabled: bool, quiet: bool) -> Self {
        let enabled = enabled && !quiet;
        let shared = Arc::new(MonitorShared {
            total_files: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            processed_files: AtomicU64::new(0),
            processed_bytes: AtomicU64::new(0),
            start: Instant::now(),
            shutdown: AtomicBool::new(false),
        });

        let render_thread = if enabled {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("cclone-progress".into())
                .spawn(move || {
                    while !shared.shutdown.load(Ordering::Relaxed) {
                        render(&shared);
                        std::thread::sleep(RENDER_INTERVAL);
                    }
                })
                .ok()
        } else {
            None
        };

        Self {
            shared,
            render_thread,
            enabled,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total_files: self.shared.total_files.load(Ordering::Relaxed),
            total_bytes: self.shared.total_bytes.load(Ordering::Relaxed),
            processed_files: self.shared.processed_files.load(Ordering::Relaxed),
            processed_bytes: self.shared.processed_bytes.load(Ordering::Relaxed),
        }
    }
}

impl ProgressSink for ProgressMonitor {
    fn set_total(&self, files: u64, bytes: u64) {
        self.shared.total_files.store(files, Ordering::Relaxed);
        self.shared.total_bytes.store(bytes, Ordering::Relaxed);
    }

    fn update(&self, delta_files: u64, delta_bytes: u64) {
        self.shared.processed_files.fetch_add(delta_files, Ordering::Relaxed);
        self.shared.processed_bytes.fetch_add(delta_bytes, Ordering::Relaxed);
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.render_thread.take() {
            let _ = handle.join();
        }
        if self.enabled {
            render(&self.shared);
            eprintln!();
        }
    }
}

fn render(shared: &MonitorShared) {
    let total_files = shared.total_files.load(Ordering::Relaxed);
    if total_files == 0 {
        return;
    }
    let total_bytes = shared.total_bytes.load(Ordering::Relaxed);
    let processed_files = shared.processed_files.load(Ordering::Relaxed);
    let processed_bytes = shared.processed_bytes.load(Ordering::Relaxed);

    let file_progress = processed_files as f64 / total_files as f64;
    let filled = ((file_progress * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
    let bar: String = "█".repeat(filled) + &"░".repeat(BAR_WIDTH - filled);

    let elapsed = shared.start.elapsed().as_secs_f64();
    let rate = if elapsed > 0.0 {
        processed_bytes as f64 / elapsed
    } else {
        0.0
    };
    let (speed, unit) = scale_rate(rate);

    let eta = if rate > 0.0 && processed_bytes > 0 {
        let remaining = total_bytes.saturating_sub(processed_bytes) as f64;
        format_eta(remaining / rate)
    } else {
        "inf".to_string()
    };

    // \r + clear-line keeps the render on a single terminal line.
    eprint!(
        "\r\x1b[K[{bar}] {speed:.1} {unit} | ETA: {eta} | {processed_files}/{total_files} files"
    );
}

fn scale_rate(bytes_per_sec: f64) -> (f64, &'static str) {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * KB;
    const GB: f64 = 1024.0 * MB;
    if bytes_per_sec > GB {
        (bytes_per_sec / GB, "GB/s")
    } else if bytes_per_sec > MB {
        (bytes_per_sec / MB, "MB/s")
    } else if bytes_per_sec > KB {
        (bytes_per_sec / KB, "KB/s")
    } else {
        (bytes_per_sec, "B/s")
    }
}

fn format_eta(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "inf".to_string();
    }
    let total = seconds as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}
