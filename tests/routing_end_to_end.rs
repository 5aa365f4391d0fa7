//! Dispatch through a route table and execute the implied transfers.

use assert_fs::prelude::*;
use shunt::{
    Candidate, Condition, Filter, LocalFs, MemFs, Mover, Route, RouteError, RouteTable,
    TransferOutcome,
};
use std::path::Path;

fn table(dst: shunt::StorageHandle) -> RouteTable {
    RouteTable::builder()
        .destination("archive", dst)
        .route(Route::new(
            "csv",
            Filter::Extension("csv".to_string()),
            "archive",
            "csv",
            Condition::NotExists,
        ))
        .route(Route::new(
            "invoices",
            Filter::AllOf(vec![
                Filter::Extension("txt".to_string()),
                Filter::ContentContains("invoice".to_string()),
            ]),
            "archive",
            "invoices",
            Condition::Always,
        ))
        .build()
        .unwrap()
}

#[test]
fn dispatch_and_move_by_extension() {
    let temp = assert_fs::TempDir::new().unwrap();
    let incoming = temp.child("incoming");
    incoming.create_dir_all().unwrap();
    incoming.child("report.csv").write_str("a,b").unwrap();

    let src = LocalFs::open(incoming.path()).unwrap();
    let dst = LocalFs::create(temp.child("archive").path()).unwrap();
    let table = table(dst);

    let candidate = Candidate::new("report.csv");
    let route = table.dispatch(&candidate).unwrap().expect("route expected");
    assert_eq!(route.name(), "csv");

    let req = table
        .request_for(route, &src, candidate.path())
        .expect("destination registered");
    let outcome = Mover::new().move_file(&req).unwrap();
    assert!(matches!(
        outcome,
        TransferOutcome::MovedOptimized | TransferOutcome::MovedViaCopy { .. }
    ));
    let routed = temp.child("archive/csv/report.csv");
    assert_eq!(std::fs::read_to_string(routed.path()).unwrap(), "a,b");
    assert!(!incoming.child("report.csv").path().exists());
}

#[test]
fn content_filter_needs_loaded_payload() {
    let dst = MemFs::new();
    let table = table(dst);
    assert!(table.needs_payload());

    // Without payload the content route cannot claim the file.
    let bare = Candidate::new("note.txt");
    assert!(table.dispatch(&bare).unwrap().is_none());

    let loaded = Candidate::new("note.txt").with_payload("invoice #42");
    let route = table.dispatch(&loaded).unwrap().expect("route expected");
    assert_eq!(route.name(), "invoices");
}

#[test]
fn ambiguous_candidates_are_refused() {
    let dst = MemFs::new();
    let table = RouteTable::builder()
        .destination("a", dst.clone())
        .route(Route::new(
            "by-ext",
            Filter::Extension("csv".to_string()),
            "a",
            "x",
            Condition::Always,
        ))
        .route(Route::new(
            "by-name",
            Filter::NameContains("report".to_string()),
            "a",
            "y",
            Condition::Always,
        ))
        .build()
        .unwrap();

    let err = table
        .dispatch(&Candidate::new("report.csv"))
        .unwrap_err();
    match err {
        RouteError::MultipleRoutes { path, names } => {
            assert_eq!(path, Path::new("report.csv"));
            assert_eq!(names, vec!["by-ext".to_string(), "by-name".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}
