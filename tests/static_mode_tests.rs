//! Static-mode integration tests: in-place replacement of duplicates
//! with hard links into the reference tree
#![allow(clippy::unwrap_used)]

mod common;

use common::{ino, static_options};
use snaplink::replicate;
use std::fs;

#[test]
fn duplicate_is_replaced_by_a_link_to_reference() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir(tmp.path().join("work")).unwrap();
    fs::create_dir(tmp.path().join("snap")).unwrap();
    fs::write(tmp.path().join("work/a"), "hello").unwrap();
    fs::write(tmp.path().join("snap/a"), "hello").unwrap();
    let ref_ino = ino(&tmp.path().join("snap/a"));
    assert_ne!(ino(&tmp.path().join("work/a")), ref_ino);

    let stats = replicate(&static_options(
        &tmp.path().join("work"),
        &tmp.path().join("snap"),
    ))
    .unwrap();

    assert_eq!(stats.files_replaced, 1);
    assert_eq!(ino(&tmp.path().join("work/a")), ref_ino);
    assert_eq!(fs::read(tmp.path().join("work/a")).unwrap(), b"hello");
}

#[test]
fn second_run_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir(tmp.path().join("work")).unwrap();
    fs::create_dir(tmp.path().join("snap")).unwrap();
    fs::write(tmp.path().join("work/a"), "hello").unwrap();
    fs::write(tmp.path().join("snap/a"), "hello").unwrap();

    let opts = static_options(&tmp.path().join("work"), &tmp.path().join("snap"));
    let first = replicate(&opts).unwrap();
    let after_first = ino(&tmp.path().join("work/a"));
    let second = replicate(&opts).unwrap();

    assert_eq!(first.files_replaced, 1);
    // The rerun sees one shared inode and takes the no-op path.
    assert_eq!(second.files_replaced, 0);
    assert_eq!(ino(&tmp.path().join("work/a")), after_first);
}

#[test]
fn divergent_file_is_kept_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir(tmp.path().join("work")).unwrap();
    fs::create_dir(tmp.path().join("snap")).unwrap();
    fs::write(tmp.path().join("work/a"), "mine").unwrap();
    fs::write(tmp.path().join("snap/a"), "ours").unwrap();
    let before = ino(&tmp.path().join("work/a"));

    let stats = replicate(&static_options(
        &tmp.path().join("work"),
        &tmp.path().join("snap"),
    ))
    .unwrap();

    assert_eq!(stats.files_kept, 1);
    assert_eq!(stats.files_replaced, 0);
    assert_eq!(ino(&tmp.path().join("work/a")), before);
    assert_eq!(fs::read(tmp.path().join("work/a")).unwrap(), b"mine");
}

#[test]
fn descent_reaches_nested_duplicates_without_materializing() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("work/sub/deep")).unwrap();
    fs::create_dir_all(tmp.path().join("snap/sub/deep")).unwrap();
    fs::write(tmp.path().join("work/sub/deep/f"), "shared").unwrap();
    fs::write(tmp.path().join("snap/sub/deep/f"), "shared").unwrap();

    let stats = replicate(&static_options(
        &tmp.path().join("work"),
        &tmp.path().join("snap"),
    ))
    .unwrap();

    assert_eq!(stats.files_replaced, 1);
    assert_eq!(
        ino(&tmp.path().join("work/sub/deep/f")),
        ino(&tmp.path().join("snap/sub/deep/f"))
    );
    // In-place descent creates nothing.
    assert_eq!(stats.directories_created, 0);
}

#[test]
fn missing_reference_changes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir(tmp.path().join("work")).unwrap();
    fs::write(tmp.path().join("work/a"), "data").unwrap();
    let before = ino(&tmp.path().join("work/a"));

    let stats = replicate(&static_options(
        &tmp.path().join("work"),
        &tmp.path().join("gone"),
    ))
    .unwrap();

    assert_eq!(stats.files_replaced, 0);
    assert_eq!(ino(&tmp.path().join("work/a")), before);
    assert_eq!(fs::read(tmp.path().join("work/a")).unwrap(), b"data");
}

#[test]
fn symlinks_and_directories_survive_static_runs() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir(tmp.path().join("work")).unwrap();
    fs::create_dir(tmp.path().join("snap")).unwrap();
    std::os::unix::fs::symlink("target", tmp.path().join("work/lnk")).unwrap();
    std::os::unix::fs::symlink("target", tmp.path().join("snap/lnk")).unwrap();

    replicate(&static_options(
        &tmp.path().join("work"),
        &tmp.path().join("snap"),
    ))
    .unwrap();

    // Symlinks are non-regular: never linked, never removed.
    let target = fs::read_link(tmp.path().join("work/lnk")).unwrap();
    assert_eq!(target, std::path::PathBuf::from("target"));
}
