//! Source enumeration.
//!
//! Walks each source, applies the filename filters, and maps every
//! eligible file to its destination path. Directory sources map entries
//! relative to that source's root; file sources map to
//! `destination/<filename>`. Per-entry walk errors are warnings, not
//! failures.

use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::config::Config;

/// One file scheduled for copying.
#[derive(Debug, Clone)]
pub struct CopyJob {
    pub source_path: PathBuf,
    pub dest_path: PathBuf,
    pub size: u64,
}

/// Outcome of enumeration: the jobs to dispatch plus the number of files
/// the filters excluded (reported as skipped in the run stats).
#[derive(Debug, Default)]
pub struct Enumeration {
    pub jobs: Vec<CopyJob>,
    pub filtered: u64,
}

impl Enumeration {
    pub fn total_bytes(&self) -> u64 {
        self.jobs.iter().map(|job| job.size).sum()
    }
}

/// Compiled filename filters. Invalid patterns are logged and skipped
/// at compile time rather than failing the run.
pub struct FileFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl FileFilter {
    pub fn compile(include_patterns: &[String], exclude_patterns: &[String]) -> Self {
        Self {
            include: compile_patterns(include_patterns),
            exclude: compile_patterns(exclude_patterns),
        }
    }

    /// A file passes when no exclude pattern matches its filename and,
    /// if include patterns exist, at least one matches. Patterns must
    /// match the whole filename, not a substring of it.
    pub fn allows(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        if self.exclude.iter().any(|re| re.is_match(&name)) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|re| re.is_match(&name))
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        // Anchor so a pattern must match the entire filename.
        .filter_map(|pattern| match Regex::new(&format!("^(?:{pattern})$")) {
            Ok(re) => Some(re),
            Err(e) => {
                log::warn!("ignoring invalid filter pattern {pattern:?}: {e}");
                None
            }
        })
        .collect()
}

/// Enumerate all sources against `destination`.
pub fn enumerate_sources(
    config: &Config,
    sources: &[PathBuf],
    destination: &Path,
) -> Enumeration {
    let filter = FileFilter::compile(&config.include_patterns, &config.exclude_patterns);
    let mut out = Enumeration::default();

    for source in sources {
        if source.is_dir() {
            enumerate_directory(config, &filter, source, destination, &mut out);
        } else if source.is_file() {
            // Explicit file sources bypass the filters.
            let size = match std::fs::metadata(source) {
                Ok(md) => md.len(),
                Err(e) => {
                    log::warn!("cannot stat {}: {e}", source.display());
                    continue;
                }
            };
            let Some(name) = source.file_name() else {
                log::warn!("skipping source without a filename: {}", source.display());
                continue;
            };
            out.jobs.push(CopyJob {
                source_path: source.clone(),
                dest_path: destination.join(name),
                size,
            });
        } else {
            log::warn!("skipping non-file source: {}", source.display());
        }
    }

    out
}

fn enumerate_directory(
    config: &Config,
    filter: &FileFilter,
    root: &Path,
    destination: &Path,
    out: &mut Enumeration,
) {
    let max_depth = if config.recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .max_depth(max_depth);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("enumeration error under {}: {e}", root.display());
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        // Regular files and symlinks are eligible; anything else is skipped.
        if !file_type.is_file() && !file_type.is_symlink() {
            log::warn!("skipping non-file: {}", entry.path().display());
            continue;
        }

        if !filter.allows(entry.path()) {
            out.filtered += 1;
            continue;
        }

        let size = match entry.metadata() {
            Ok(md) => md.len(),
            Err(e) => {
                log::warn!("cannot stat {}: {e}", entry.path().display());
                continue;
            }
        };

        let relative = match entry.path().strip_prefix(root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => PathBuf::from(entry.file_name()),
        };

        out.jobs.push(CopyJob {
            source_path: entry.path().to_path_buf(),
            dest_path: destination.join(relative),
            size,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(recursive: bool) -> Config {
        Config {
            recursive,
            ..Config::default()
        }
    }

    #[test]
    fn recursive_walk_maps_relative_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(src.join("a/b")).unwrap();
        std::fs::write(src.join("top.txt"), b"1").unwrap();
        std::fs::write(src.join("a/mid.txt"), b"22").unwrap();
        std::fs::write(src.join("a/b/deep.txt"), b"333").unwrap();

        let dest = tmp.path().join("dst");
        let result = enumerate_sources(&config(true), &[src.clone()], &dest);

        assert_eq!(result.jobs.len(), 3);
        assert_eq!(result.total_bytes(), 6);
        let deep = result
            .jobs
            .iter()
            .find(|j| j.source_path.ends_with("deep.txt"))
            .unwrap();
        assert_eq!(deep.dest_path, dest.join("a/b/deep.txt"));
    }

    #[test]
    fn non_recursive_walk_stays_at_the_top() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("top.txt"), b"1").unwrap();
        std::fs::write(src.join("nested/below.txt"), b"2").unwrap();

        let result = enumerate_sources(&config(false), &[src], &tmp.path().join("dst"));
        assert_eq!(result.jobs.len(), 1);
        assert!(result.jobs[0].source_path.ends_with("top.txt"));
    }

    #[test]
    fn file_source_maps_to_destination_filename() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("single.bin");
        std::fs::write(&file, b"data").unwrap();

        let dest = tmp.path().join("dst");
        let result = enumerate_sources(&config(false), &[file], &dest);
        assert_eq!(result.jobs.len(), 1);
        assert_eq!(result.jobs[0].dest_path, dest.join("single.bin"));
    }

    #[test]
    fn include_and_exclude_combine() {
        let filter = FileFilter::compile(
            &["[a-c]\\.txt".to_string()],
            &["b\\.txt".to_string()],
        );
        assert!(filter.allows(Path::new("a.txt")));
        assert!(!filter.allows(Path::new("b.txt")));
        assert!(filter.allows(Path::new("c.txt")));
        assert!(!filter.allows(Path::new("d.txt")));
    }

    #[test]
    fn filtered_files_are_counted() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        for name in ["a.txt", "b.txt", "c.log"] {
            std::fs::write(src.join(name), b"x").unwrap();
        }

        let cfg = Config {
            recursive: true,
            include_patterns: vec![".*\\.txt".into()],
            ..Config::default()
        };
        let result = enumerate_sources(&cfg, &[src], &tmp.path().join("dst"));
        assert_eq!(result.jobs.len(), 2);
        assert_eq!(result.filtered, 1);
    }

    #[test]
    fn patterns_match_the_whole_filename() {
        let filter = FileFilter::compile(&[], &["tmp".to_string()]);
        // A bare pattern only excludes a filename it matches entirely.
        assert!(filter.allows(Path::new("file.tmp.bak")));
        assert!(!filter.allows(Path::new("tmp")));

        let filter = FileFilter::compile(&["a".to_string()], &[]);
        assert!(filter.allows(Path::new("a")));
        assert!(!filter.allows(Path::new("a.txt")));
    }

    #[test]
    fn invalid_pattern_is_skipped_not_fatal() {
        let filter = FileFilter::compile(&["[unclosed".to_string()], &[]);
        // The broken include pattern is dropped, leaving no includes.
        assert!(filter.allows(Path::new("anything.txt")));
    }
}
