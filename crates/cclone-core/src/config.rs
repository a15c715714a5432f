//! Engine configuration.
//!
//! A `Config` is constructed once per run (file values merged with CLI
//! overrides by the front-end) and shared read-only with the engine.

use serde::Deserialize;

use crate::copy::DEFAULT_CHUNK_SIZE;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recursive: bool,
    pub follow_symlinks: bool,
    /// Hash source and destination after each copy.
    pub verify: bool,
    /// Treat an existing destination as a partial transfer.
    pub resume: bool,
    pub progress: bool,
    pub quiet: bool,
    pub preserve_metadata: bool,
    /// Worker count; `None` means hardware parallelism.
    pub threads: Option<usize>,
    /// Chunk size in bytes for large-file copies.
    pub buffer_size: Option<usize>,
    /// Regexes matched against filenames; any match excludes the file.
    #[serde(rename = "exclude")]
    pub exclude_patterns: Vec<String>,
    /// Regexes matched against filenames; when non-empty a match is required.
    #[serde(rename = "include")]
    pub include_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recursive: false,
            follow_symlinks: false,
            verify: false,
            resume: false,
            progress: true,
            quiet: false,
            preserve_metadata: true,
            threads: None,
            buffer_size: None,
            exclude_patterns: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

impl Config {
    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or(DEFAULT_CHUNK_SIZE).max(4096)
    }

    /// Fold `other` (typically CLI values) over `self` (typically file
    /// values). Booleans are only turned on by the overriding side,
    /// except `progress` which the overrider may turn off; options and
    /// pattern lists replace when set.
    pub fn merge_with(&mut self, other: &Config) {
        if other.threads.is_some() {
            self.threads = other.threads;
        }
        if other.buffer_size.is_some() {
            self.buffer_size = other.buffer_size;
        }
        if other.recursive {
            self.recursive = true;
        }
        if other.follow_symlinks {
            self.follow_symlinks = true;
        }
        if other.verify {
            self.verify = true;
        }
        if other.resume {
            self.resume = true;
        }
        if !other.progress {
            self.progress = false;
        }
        if other.quiet {
            self.quiet = true;
        }
        if !other.preserve_metadata {
            self.preserve_metadata = false;
        }
        if !other.exclude_patterns.is_empty() {
            self.exclude_patterns = other.exclude_patterns.clone();
        }
        if !other.include_patterns.is_empty() {
            self.include_patterns = other.include_patterns.clone();
        }
    }
}
