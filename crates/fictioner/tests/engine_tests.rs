//! Engine scheduling and snapshot handoff

use std::fs;
use std::path::Path;
use std::sync::Arc;

use fictioner::engine::{Engine, ScanOutcome};
use fictioner_core::{CONFIG_FILE_NAME, Cursor};

fn workspace(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, text) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }
    dir
}

fn engine(root: &Path) -> Engine {
    Engine::new(root, root.join(CONFIG_FILE_NAME))
}

const CONFIG: &str = r#"{ "title": "Door", "contents": ["a.md", "b.md"] }"#;

#[tokio::test]
async fn starts_empty_then_publishes() {
    let dir = workspace(&[
        (CONFIG_FILE_NAME, CONFIG),
        ("a.md", "<!-- #door? -->\n"),
        ("b.md", "<!-- #door! -->\n"),
    ]);
    let engine = engine(dir.path());
    assert_eq!(engine.current().generation(), 0);
    assert!(engine.current().files().is_empty());

    let outcome = engine.scan().await;
    let ScanOutcome::Published { generation, files, tags, .. } = outcome else {
        panic!("expected a published scan, got {outcome:?}");
    };
    assert_eq!(generation, 1);
    assert_eq!(files, 2);
    assert_eq!(tags, 2);
    assert_eq!(engine.current().generation(), 1);
    assert!(engine.error().is_none());
}

#[tokio::test]
async fn failed_scan_keeps_previous_snapshot() {
    let dir = workspace(&[(CONFIG_FILE_NAME, CONFIG), ("a.md", "x\n"), ("b.md", "y\n")]);
    let engine = engine(dir.path());
    assert!(engine.scan().await.is_published());

    fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
    let outcome = engine.scan().await;
    let ScanOutcome::Failed { generation, message } = outcome else {
        panic!("expected a failed scan, got {outcome:?}");
    };
    assert_eq!(generation, 2);
    assert!(message.starts_with("Error scanning document:"), "{message}");
    assert_eq!(engine.error().as_deref(), Some(message.as_str()));
    assert_eq!(engine.current().generation(), 1);
    assert_eq!(engine.current().files().len(), 2);

    // a good config clears the error
    fs::write(dir.path().join(CONFIG_FILE_NAME), CONFIG).unwrap();
    assert!(engine.scan().await.is_published());
    assert!(engine.error().is_none());
    assert_eq!(engine.current().generation(), 3);
}

#[tokio::test]
async fn subscribers_see_each_publish() {
    let dir = workspace(&[(CONFIG_FILE_NAME, CONFIG), ("a.md", "x\n"), ("b.md", "y\n")]);
    let engine = engine(dir.path());
    let mut rx = engine.subscribe();

    engine.scan().await;
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().generation(), 1);

    fs::write(dir.path().join("b.md"), "<!-- #new -->\n").unwrap();
    engine.scan().await;
    rx.changed().await.unwrap();
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.generation(), 2);
    assert_eq!(snapshot.identifiers(), vec!["new"]);
}

#[tokio::test]
async fn concurrent_scans_publish_the_latest() {
    let files: Vec<(String, String)> = (0..50)
        .map(|i| (format!("ch{i:02}.md"), format!("text {i}\n<!-- #t{i} -->\n")))
        .collect();
    let mut entries: Vec<(&str, &str)> = files
        .iter()
        .map(|(n, t)| (n.as_str(), t.as_str()))
        .collect();
    let config = r#"{ "title": "t", "contents": "ch*.md" }"#;
    entries.push((CONFIG_FILE_NAME, config));
    let dir = workspace(&entries);
    let engine = Arc::new(engine(dir.path()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.scan().await })
        })
        .collect();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    // the newest request always wins, whatever order the scans finish in
    let latest = outcomes.iter().map(ScanOutcome::generation).max().unwrap();
    assert_eq!(latest, 8);
    assert!(
        outcomes
            .iter()
            .any(|o| o.generation() == latest && o.is_published())
    );
    assert_eq!(engine.current().generation(), latest);
    assert_eq!(engine.current().files().len(), 50);
}

#[tokio::test]
async fn related_reads_the_current_snapshot() {
    let dir = workspace(&[
        (CONFIG_FILE_NAME, CONFIG),
        ("a.md", "<!-- #door? -->\nlocked\n"),
        ("b.md", "<!-- #door! -->\nopen\n"),
    ]);
    let engine = engine(dir.path());
    assert!(engine.related(&Cursor::new("a.md", 0, 6)).is_empty());

    engine.scan().await;
    let records = engine.related(&Cursor::new("a.md", 0, 6));
    assert_eq!(records.len(), 2);
    assert!(records[0].is_current());

    let buffer = ["draft", "<!-- #door -->"];
    let records = engine.related_in(&Cursor::new("a.md", 1, 7), &buffer);
    assert_eq!(records.len(), 2);
}
