mod common;

use common::{contact_added, open_store};
use contactfold::{ContactKind, EventLog};
use std::fs;
use tempfile::tempdir;

/// Crash during a rewrite leaves a partial `.tmp` next to the log.
/// The committed log is intact and the stale `.tmp` is ignored.
#[test]
fn test_crash_during_rewrite() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");

    {
        let mut log = EventLog::open(&path).unwrap();
        log.append(contact_added(0, "A", ContactKind::Lead)).unwrap();
        log.append(contact_added(1, "B", ContactKind::Lead)).unwrap();
    }

    let tmp = dir.path().join("events.json.tmp");
    fs::write(&tmp, r#"[{"id": "partial", "type": "CONTACT_ADD"#).unwrap();

    let mut log = EventLog::open(&path).unwrap();
    assert_eq!(log.load().unwrap().len(), 2);
    assert!(!tmp.exists(), "stale temp file should be cleaned up on load");

    // New appends succeed.
    log.append(contact_added(2, "C", ContactKind::Lead)).unwrap();
    assert_eq!(log.len(), 3);
}

/// A rewrite never leaves the temp file behind on success.
#[test]
fn test_no_tmp_after_append() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");
    let mut log = EventLog::open(&path).unwrap();
    log.append(contact_added(0, "A", ContactKind::Lead)).unwrap();

    assert!(path.exists());
    assert!(!dir.path().join("events.json.tmp").exists());
}

/// A restart after a crash mid-write rebuilds the last committed state.
#[test]
fn test_store_recovers_committed_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("crm.json");

    let committed = {
        let mut store = open_store(&path);
        store
            .add_contact("John", "j@x.com", ContactKind::Lead)
            .unwrap();
        store.state()
    };

    fs::write(dir.path().join("crm.json.tmp"), "[").unwrap();

    let store = open_store(&path);
    assert_eq!(store.state(), committed);
}

/// The log directory is created on first write.
#[test]
fn test_append_creates_parent_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data").join("events.json");
    let mut log = EventLog::open(&path).unwrap();
    log.append(contact_added(0, "A", ContactKind::Lead)).unwrap();
    assert!(path.exists());
}
