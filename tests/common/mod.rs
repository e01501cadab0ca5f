#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use contactfold::{
    Channel, Communication, Contact, ContactKind, Direction, Event, EventKind, Store, Updates,
};
use serde_json::Value;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn updates(value: Value) -> Updates {
    value.as_object().cloned().unwrap()
}

pub fn contact(id: u64, name: &str, kind: ContactKind) -> Contact {
    let mut contact = Contact::new(id, name, &format!("{}@example.com", name.to_lowercase()), kind);
    contact.created_at = at(id as i64);
    contact
}

pub fn communication(id: u64, contact_id: u64, content: &str, secs: i64) -> Communication {
    let mut comm = Communication::new(id, contact_id, Channel::Email, content, Direction::Outbound);
    comm.timestamp = at(secs);
    comm
}

pub fn contact_added(id: u64, name: &str, kind: ContactKind) -> Event {
    Event::new(EventKind::ContactAdded(contact(id, name, kind))).with_timestamp(at(id as i64))
}

pub fn contact_updated(contact_id: u64, fields: Value) -> Event {
    Event::new(EventKind::ContactUpdated {
        contact_id,
        updates: updates(fields),
    })
}

pub fn communication_recorded(id: u64, contact_id: u64, content: &str) -> Event {
    Event::new(EventKind::CommunicationRecorded(communication(
        id, contact_id, content, id as i64,
    )))
}

pub fn communication_updated(communication_id: u64, fields: Value, secs: i64) -> Event {
    Event::new(EventKind::CommunicationUpdated {
        communication_id,
        updates: updates(fields),
        previous_content: None,
    })
    .with_timestamp(at(secs))
}

/// Open and initialize a store on `path`.
pub fn open_store(path: &Path) -> Store {
    let mut store = Store::open(path).unwrap();
    store.initialize().unwrap();
    store
}

/// An observer that records every value it sees.
pub fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(&T) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    (seen, move |value: &T| sink.borrow_mut().push(value.clone()))
}
