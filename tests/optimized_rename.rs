//! Fast paths: same-backend renames and common-ancestor renames between two
//! local roots over the same tree.

use shunt::{Condition, LocalFs, Mover, TransferOutcome, TransferRequest};
use std::fs;

#[test]
fn same_backend_uses_direct_rename() {
    let tmp = tempfile::tempdir().unwrap();
    let fs_handle = LocalFs::open(tmp.path()).unwrap();
    fs::write(tmp.path().join("a.txt"), "hello").unwrap();

    let req = TransferRequest::new(
        fs_handle.clone(),
        "a.txt",
        fs_handle.clone(),
        "done/a.txt",
        Condition::Always,
    );
    let outcome = Mover::new().move_file(&req).unwrap();

    assert_eq!(outcome, TransferOutcome::MovedDirect);
    assert!(!tmp.path().join("a.txt").exists());
    assert_eq!(
        fs::read_to_string(tmp.path().join("done/a.txt")).unwrap(),
        "hello"
    );
}

#[test]
fn two_opens_of_one_root_share_identity() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.txt"), "x").unwrap();
    let first = LocalFs::open(tmp.path()).unwrap();
    let second = LocalFs::open(tmp.path()).unwrap();

    let req = TransferRequest::new(first, "a.txt", second, "b.txt", Condition::Always);
    let outcome = Mover::new().move_file(&req).unwrap();
    assert_eq!(outcome, TransferOutcome::MovedDirect);
}

#[test]
fn sibling_roots_rename_through_common_ancestor() {
    let tmp = tempfile::tempdir().unwrap();
    let incoming = tmp.path().join("incoming");
    let archive = tmp.path().join("archive");
    fs::create_dir_all(&incoming).unwrap();
    fs::create_dir_all(&archive).unwrap();
    fs::write(incoming.join("report.csv"), "a,b,c").unwrap();

    let src = LocalFs::open(&incoming).unwrap();
    let dst = LocalFs::open(&archive).unwrap();
    assert!(!src.same_backend(&dst));

    let req = TransferRequest::new(
        src.clone(),
        "report.csv",
        dst,
        "2024/report.csv",
        Condition::Always,
    );
    let outcome = Mover::new().move_file(&req).unwrap();

    assert_eq!(outcome, TransferOutcome::MovedOptimized);
    assert!(!incoming.join("report.csv").exists());
    assert_eq!(
        fs::read_to_string(archive.join("2024/report.csv")).unwrap(),
        "a,b,c"
    );
}

#[test]
fn optimized_rename_preserves_content_and_mtime() {
    let tmp = tempfile::tempdir().unwrap();
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    fs::create_dir_all(&a).unwrap();
    fs::create_dir_all(&b).unwrap();
    fs::write(a.join("f"), "payload").unwrap();
    let before = fs::metadata(a.join("f")).unwrap().modified().unwrap();

    let src = LocalFs::open(&a).unwrap();
    let dst = LocalFs::open(&b).unwrap();
    let req = TransferRequest::new(src, "f", dst, "f", Condition::Always).preserve_time(true);
    let outcome = Mover::new().move_file(&req).unwrap();

    assert_eq!(outcome, TransferOutcome::MovedOptimized);
    // Rename carries metadata along; nothing to restore afterwards.
    let after = fs::metadata(b.join("f")).unwrap().modified().unwrap();
    assert_eq!(before, after);
}

#[test]
fn condition_still_gates_the_fast_path() {
    let tmp = tempfile::tempdir().unwrap();
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    fs::create_dir_all(&a).unwrap();
    fs::create_dir_all(&b).unwrap();
    fs::write(a.join("f"), "new").unwrap();
    fs::write(b.join("f"), "keep").unwrap();

    let src = LocalFs::open(&a).unwrap();
    let dst = LocalFs::open(&b).unwrap();
    let req = TransferRequest::new(src, "f", dst, "f", Condition::NotExists);
    let outcome = Mover::new().move_file(&req).unwrap();

    assert_eq!(outcome, TransferOutcome::Skipped);
    assert_eq!(fs::read_to_string(b.join("f")).unwrap(), "keep");
    assert_eq!(fs::read_to_string(a.join("f")).unwrap(), "new");
}
