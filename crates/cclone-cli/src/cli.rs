use clap::Parser;
use std::path::PathBuf;

use cclone_core::Config;

#[derive(Parser, Debug)]
#[command(name = "cclone", version)]
#[command(about = "High-throughput local file replication")]
pub struct Cli {
    /// Source paths followed by the destination directory
    #[arg(required = true, num_args = 2.., value_name = "PATH")]
    pub paths: Vec<PathBuf>,
    /// Descend into source directories
    #[arg(short, long)]
    pub recursive: bool,
    /// Follow symlinks during enumeration
    #[arg(long)]
    pub follow_symlinks: bool,
    /// Verify each copy by content hash
    #[arg(long)]
    pub verify: bool,
    /// Treat existing destinations as partial transfers
    #[arg(long)]
    pub resume: bool,
    /// Disable the progress line
    #[arg(long)]
    pub no_progress: bool,
    /// Suppress progress rendering entirely
    #[arg(short, long)]
    pub quiet: bool,
    /// Do not replicate mtime and permissions
    #[arg(long)]
    pub no_preserve_metadata: bool,
    /// Worker thread count (default: hardware parallelism)
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,
    /// Chunk size in bytes for large-file copies
    #[arg(long, value_name = "BYTES")]
    pub buffer_size: Option<usize>,
    /// Filename regex a file must match to be copied; may repeat
    #[arg(long = "include", value_name = "REGEX")]
    pub include: Vec<String>,
    /// Filename regex that excludes matching files; may repeat
    #[arg(long = "exclude", value_name = "REGEX")]
    pub exclude: Vec<String>,
}

impl Cli {
    /// Express the flags as a `Config` suitable for merging over file
    /// values (CLI wins).
    pub fn to_config(&self) -> Config {
        Config {
            recursive: self.recursive,
            follow_symlinks: self.follow_symlinks,
            verify: self.verify,
            resume: self.resume,
            progress: !self.no_progress,
            quiet: self.quiet,
            preserve_metadata: !self.no_preserve_metadata,
            threads: self.threads,
            buffer_size: self.buffer_size,
            include_patterns: self.include.clone(),
            exclude_patterns: self.exclude.clone(),
        }
    }
}
