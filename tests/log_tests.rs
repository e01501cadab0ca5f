mod common;

use common::{at, communication_recorded, contact_added, contact_updated};
use contactfold::{ContactKind, Error, Event, EventLog, EventType};
use serde_json::json;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_load_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");
    let mut log = EventLog::open(&path).unwrap();

    assert!(log.load().unwrap().is_empty());
    assert!(log.is_empty());
    assert!(!path.exists(), "load should not create the log file");
}

#[test]
fn test_load_blank_file_is_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");
    fs::write(&path, "  \n").unwrap();

    let mut log = EventLog::open(&path).unwrap();
    assert!(log.load().unwrap().is_empty());
}

#[test]
fn test_append_writes_whole_array() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");
    let mut log = EventLog::open(&path).unwrap();
    log.load().unwrap();

    log.append(contact_added(0, "John", ContactKind::Lead)).unwrap();
    log.append(contact_updated(0, json!({"type": "customer"})))
        .unwrap();

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let array = on_disk.as_array().unwrap();
    assert_eq!(array.len(), 2);
    assert_eq!(array[0]["type"], "CONTACT_ADDED");
    assert_eq!(array[1]["type"], "CONTACT_UPDATED");
}

#[test]
fn test_append_returns_stored_event() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(dir.path().join("events.json")).unwrap();

    let event = contact_added(0, "John", ContactKind::Lead);
    let id = event.id.clone();
    let stored = log.append(event).unwrap();
    assert_eq!(stored.id, id);
    assert_eq!(log.len(), 1);
}

#[test]
fn test_reload_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");
    let events = vec![
        contact_added(0, "John", ContactKind::Lead),
        communication_recorded(1, 0, "hi"),
        contact_updated(0, json!({"tags": ["vip"]})),
    ];

    {
        let mut log = EventLog::open(&path).unwrap();
        for event in events.clone() {
            log.append(event).unwrap();
        }
    }

    let mut log = EventLog::open(&path).unwrap();
    assert_eq!(log.load().unwrap(), events.as_slice());
}

#[test]
fn test_append_many_single_rewrite() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");
    let mut log = EventLog::open(&path).unwrap();

    let batch = vec![
        contact_added(0, "A", ContactKind::Lead),
        contact_added(1, "B", ContactKind::Lead),
        contact_added(2, "C", ContactKind::Customer),
    ];
    let appended = log.append_many(batch.clone()).unwrap();
    assert_eq!(appended, batch.as_slice());

    drop(log);
    let mut reopened = EventLog::open(&path).unwrap();
    assert_eq!(reopened.load().unwrap().len(), 3);
}

#[test]
fn test_append_many_returns_only_new_events() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(dir.path().join("events.json")).unwrap();
    log.append(contact_added(0, "A", ContactKind::Lead)).unwrap();

    let appended = log
        .append_many(vec![communication_recorded(1, 0, "hi")])
        .unwrap();
    assert_eq!(appended.len(), 1);
    assert_eq!(log.len(), 2);
}

#[test]
fn test_get_all_is_a_copy() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(dir.path().join("events.json")).unwrap();
    log.append(contact_added(0, "John", ContactKind::Lead)).unwrap();

    let mut copy = log.get_all();
    copy.clear();
    copy.push(contact_added(9, "Mallory", ContactKind::Lead));

    assert_eq!(log.len(), 1);
    assert_eq!(log.events()[0].summary(), "Added contact: John (lead)");
}

#[test]
fn test_get_by_type() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(dir.path().join("events.json")).unwrap();
    log.append_many(vec![
        contact_added(0, "A", ContactKind::Lead),
        communication_recorded(1, 0, "hi"),
        contact_added(2, "B", ContactKind::Lead),
    ])
    .unwrap();

    let added = log.get_by_type(EventType::ContactAdded);
    assert_eq!(added.len(), 2);
    assert!(log.get_by_type(EventType::CommunicationUpdated).is_empty());
}

#[test]
fn test_get_since_is_strict() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(dir.path().join("events.json")).unwrap();
    log.append_many(vec![
        contact_added(0, "A", ContactKind::Lead),
        contact_added(1, "B", ContactKind::Lead),
        contact_added(2, "C", ContactKind::Lead),
    ])
    .unwrap();

    let since: Vec<&Event> = log.get_since(at(1));
    assert_eq!(since.len(), 1);
    assert_eq!(since[0].timestamp, at(2));
    assert_eq!(log.get_since(at(-1)).len(), 3);
}

#[test]
fn test_malformed_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");
    fs::write(&path, r#"{"not": "an array"}"#).unwrap();

    let mut log = EventLog::open(&path).unwrap();
    match log.load() {
        Err(Error::MalformedLog { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected MalformedLog, got {other:?}"),
    }
}

#[test]
fn test_truncated_log_is_malformed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");
    {
        let mut log = EventLog::open(&path).unwrap();
        log.append(contact_added(0, "John", ContactKind::Lead)).unwrap();
    }
    let contents = fs::read_to_string(&path).unwrap();
    fs::write(&path, &contents[..contents.len() / 2]).unwrap();

    let mut log = EventLog::open(&path).unwrap();
    assert!(matches!(log.load(), Err(Error::MalformedLog { .. })));
}

#[test]
fn test_unreadable_log_is_read_error() {
    let dir = tempdir().unwrap();
    // A directory where the file should be cannot be read as a string.
    let path = dir.path().join("events.json");
    fs::create_dir(&path).unwrap();

    let mut log = EventLog::open(&path).unwrap();
    assert!(matches!(log.load(), Err(Error::Read { .. })));
}

#[test]
fn test_write_failure_leaves_memory_ahead() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");
    let mut log = EventLog::open(&path).unwrap();
    log.append(contact_added(0, "John", ContactKind::Lead)).unwrap();

    // Replace the file with a directory so the rename fails.
    fs::remove_file(&path).unwrap();
    fs::create_dir(&path).unwrap();

    let result = log.append(contact_added(1, "Jane", ContactKind::Lead));
    assert!(matches!(result, Err(Error::DurableWrite { .. })));
    assert_eq!(log.len(), 2, "the in-memory tail is not rolled back");
}

#[test]
fn test_load_replaces_in_memory_events() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");

    let mut writer = EventLog::open_with_lock(&path, contactfold::LockMode::None).unwrap();
    writer.append(contact_added(0, "A", ContactKind::Lead)).unwrap();

    let mut reader = EventLog::open_with_lock(&path, contactfold::LockMode::None).unwrap();
    assert_eq!(reader.load().unwrap().len(), 1);

    writer.append(contact_added(1, "B", ContactKind::Lead)).unwrap();
    assert_eq!(reader.len(), 1);
    assert_eq!(reader.load().unwrap().len(), 2);
}

#[test]
fn test_pretty_printed_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.json");
    let mut log = EventLog::open(&path).unwrap();
    log.append(contact_added(0, "John", ContactKind::Lead)).unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("[\n  {"));
}
