use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cclone_core::engine::CopyEngine;
use cclone_core::hash::verify_files;
use cclone_core::progress::NoopProgress;
use cclone_core::Config;

fn engine(config: Config, resume_path: &Path) -> CopyEngine {
    CopyEngine::new(Arc::new(config), Arc::new(NoopProgress)).with_resume_path(resume_path)
}

fn quiet_config() -> Config {
    Config {
        quiet: true,
        progress: false,
        ..Config::default()
    }
}

/// Deterministic mixed text/binary content of a given size.
fn content(seed: usize, len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + seed * 7) % 256) as u8).collect()
}

#[test]
fn small_file_tree_with_verify() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");

    let mut expected_bytes = 0u64;
    let mut files: Vec<PathBuf> = Vec::new();
    for depth in 0..4 {
        let dir = (0..depth).fold(src.clone(), |acc, level| acc.join(format!("d{level}")));
        fs::create_dir_all(&dir).unwrap();
        for i in 0..25 {
            let len = 1024 + (depth * 25 + i) * 997;
            let rel = dir.join(format!("file-{depth}-{i}.bin"));
            fs::write(&rel, content(depth * 25 + i, len)).unwrap();
            expected_bytes += len as u64;
            files.push(rel);
        }
    }

    let config = Config {
        recursive: true,
        verify: true,
        threads: Some(4),
        ..quiet_config()
    };
    let stats = engine(config, &tmp.path().join(".resume"))
        .run(&[src.clone()], &dst)
        .unwrap();

    assert_eq!(stats.files_copied, 100);
    assert_eq!(stats.bytes_copied, expected_bytes);
    assert_eq!(stats.files_skipped, 0);
    assert_eq!(stats.errors, 0);

    for file in files {
        let rel = file.strip_prefix(&src).unwrap();
        assert!(verify_files(&file, &dst.join(rel)).unwrap(), "{rel:?}");
    }
}

#[test]
fn include_exclude_filters() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    for name in ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"] {
        fs::write(src.join(format!("{name}.txt")), name.as_bytes()).unwrap();
    }

    let config = Config {
        recursive: true,
        include_patterns: vec!["[a-c]\\.txt".into()],
        exclude_patterns: vec!["b\\.txt".into()],
        ..quiet_config()
    };
    let stats = engine(config, &tmp.path().join(".resume"))
        .run(&[src], &dst)
        .unwrap();

    assert_eq!(stats.files_copied, 2);
    assert_eq!(stats.files_skipped, 8);
    assert_eq!(stats.errors, 0);
    assert!(dst.join("a.txt").exists());
    assert!(!dst.join("b.txt").exists());
    assert!(dst.join("c.txt").exists());
    assert!(!dst.join("d.txt").exists());
}

#[test]
fn existing_destinations_are_overwritten_without_resume() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    for i in 0..5 {
        fs::write(src.join(format!("f{i}.bin")), content(i, 20_000)).unwrap();
        fs::write(dst.join(format!("f{i}.bin")), b"stale destination data").unwrap();
    }

    let config = Config {
        recursive: true,
        verify: true,
        ..quiet_config()
    };
    let stats = engine(config, &tmp.path().join(".resume"))
        .run(&[src.clone()], &dst)
        .unwrap();

    assert_eq!(stats.files_copied, 5);
    assert_eq!(stats.errors, 0);
    for i in 0..5 {
        let name = format!("f{i}.bin");
        assert!(verify_files(&src.join(&name), &dst.join(&name)).unwrap());
    }
}

#[test]
fn second_run_with_resume_skips_everything() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");
    fs::create_dir_all(src.join("sub")).unwrap();
    for i in 0..8 {
        fs::write(src.join("sub").join(format!("f{i}.bin")), content(i, 5_000 + i)).unwrap();
    }

    let config = Config {
        recursive: true,
        resume: true,
        ..quiet_config()
    };
    let resume_path = tmp.path().join(".resume");

    let first = engine(config.clone(), &resume_path)
        .run(&[src.clone()], &dst)
        .unwrap();
    assert_eq!(first.files_copied, 8);
    assert_eq!(first.errors, 0);

    let second = engine(config, &resume_path).run(&[src], &dst).unwrap();
    assert_eq!(second.files_copied, 0);
    assert_eq!(second.bytes_copied, 0);
    assert_eq!(second.files_skipped, 8);
    assert_eq!(second.errors, 0);
}

#[test]
fn resume_recopies_smaller_destination() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    let data = content(1, 30_000);
    fs::write(src.join("partial.bin"), &data).unwrap();
    fs::write(dst.join("partial.bin"), &data[..10_000]).unwrap();

    let config = Config {
        recursive: true,
        resume: true,
        verify: true,
        ..quiet_config()
    };
    let stats = engine(config, &tmp.path().join(".resume"))
        .run(&[src], &dst)
        .unwrap();

    assert_eq!(stats.files_copied, 1);
    assert_eq!(stats.files_skipped, 0);
    assert_eq!(fs::read(dst.join("partial.bin")).unwrap(), data);
}

#[test]
fn single_file_source_maps_to_destination_filename() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("lonely.bin");
    fs::write(&file, content(9, 2_048)).unwrap();
    let dst = tmp.path().join("dst");

    let stats = engine(quiet_config(), &tmp.path().join(".resume"))
        .run(&[file.clone()], &dst)
        .unwrap();

    assert_eq!(stats.files_copied, 1);
    assert_eq!(
        fs::read(dst.join("lonely.bin")).unwrap(),
        fs::read(&file).unwrap()
    );
}

#[test]
fn destination_directory_is_created_with_parents() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("one.txt"), b"one").unwrap();

    let dst = tmp.path().join("deeply/nested/destination");
    let config = Config {
        recursive: true,
        ..quiet_config()
    };
    let stats = engine(config, &tmp.path().join(".resume"))
        .run(&[src], &dst)
        .unwrap();

    assert_eq!(stats.files_copied, 1);
    assert!(dst.join("one.txt").exists());
}

#[cfg(unix)]
#[test]
fn unreadable_file_counts_as_error_and_run_continues() {
    use std::os::unix::fs::PermissionsExt;

    use cclone_core::copy::{copy_with_strategy, select_strategy};
    use cclone_core::ErrorKind;

    // Permission bits do not constrain root.
    if unsafe { libc::geteuid() } == 0 {
        return;
    }

    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("ok.bin"), content(3, 4_000)).unwrap();
    fs::write(src.join("locked.bin"), content(4, 4_000)).unwrap();
    fs::set_permissions(src.join("locked.bin"), fs::Permissions::from_mode(0o000)).unwrap();

    let config = Config {
        recursive: true,
        ..quiet_config()
    };
    let stats = engine(config, &tmp.path().join(".resume"))
        .run(&[src.clone()], &dst)
        .unwrap();

    assert_eq!(stats.files_copied, 1);
    assert_eq!(stats.errors, 1);
    assert!(dst.join("ok.bin").exists());

    // The per-file failure surfaces as PermissionDenied: re-run the same
    // copy path the task took against the unreadable file.
    let size = fs::metadata(src.join("locked.bin")).unwrap().len();
    let err = copy_with_strategy(
        &src.join("locked.bin"),
        &dst.join("locked.bin"),
        select_strategy(size),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PermissionDenied);

    fs::set_permissions(src.join("locked.bin"), fs::Permissions::from_mode(0o644)).unwrap();
}

#[test]
fn multiple_sources_resolve_against_their_own_roots() {
    let tmp = tempfile::tempdir().unwrap();
    let dir_source = tmp.path().join("dir-src");
    fs::create_dir_all(dir_source.join("inner")).unwrap();
    fs::write(dir_source.join("inner/tree.txt"), b"tree").unwrap();

    let file_source = tmp.path().join("alone.txt");
    fs::write(&file_source, b"alone").unwrap();

    let dst = tmp.path().join("dst");
    let config = Config {
        recursive: true,
        ..quiet_config()
    };
    let stats = engine(config, &tmp.path().join(".resume"))
        .run(&[dir_source, file_source], &dst)
        .unwrap();

    assert_eq!(stats.files_copied, 2);
    assert!(dst.join("inner/tree.txt").exists());
    assert!(dst.join("alone.txt").exists());
}
