use contactfold::{Error, EventLog, LockMode, Store};
use tempfile::tempdir;

#[test]
fn test_log_acquires_lock() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");
    let _log = EventLog::open(&path).unwrap();

    assert!(dir.path().join("events.json.lock").exists());
}

#[test]
fn test_second_writer_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");
    let _log1 = EventLog::open(&path).unwrap();

    let err = EventLog::open(&path).unwrap_err();
    assert!(matches!(err, Error::Locked { .. }));
    let msg = err.to_string();
    assert!(
        msg.contains("another writer holds the lock"),
        "error should mention the lock: {msg}"
    );
    assert!(
        msg.contains("events.json"),
        "error should mention the file path: {msg}"
    );
}

#[test]
fn test_lock_released_on_drop() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");

    {
        let _log = EventLog::open(&path).unwrap();
    }

    let _log2 = EventLog::open(&path).unwrap();
}

#[test]
fn test_lock_mode_none_allows_multiple() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");
    let _log1 = EventLog::open_with_lock(&path, LockMode::None).unwrap();
    let _log2 = EventLog::open_with_lock(&path, LockMode::None).unwrap();
}

#[test]
fn test_different_paths_do_not_contend() {
    let dir = tempdir().unwrap();
    let _a = EventLog::open(dir.path().join("a.json")).unwrap();
    let _b = EventLog::open(dir.path().join("b.json")).unwrap();
}

#[test]
fn test_store_holds_lock() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("crm-events.json");
    let _store = Store::open(&path).unwrap();

    assert!(matches!(Store::open(&path), Err(Error::Locked { .. })));
    let _unlocked = Store::builder(&path)
        .lock_mode(LockMode::None)
        .open()
        .unwrap();
}
