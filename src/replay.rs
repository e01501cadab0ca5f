//! Folding events into state.
//!
//! Every applier is total: an event that cannot be applied (unknown type, a
//! target id that does not exist, an update that would produce an invalid
//! entity) leaves the state unchanged. The store applies live commands through
//! these same functions, so a restart reproduces live state exactly.

use crate::event::{Event, EventKind};
use crate::model::{Communication, Contact, State};

/// A pure function that folds an event into state.
///
/// Reducers receive owned state and return owned state. They should be pure
/// (no I/O, no clock reads) so that folding the same events twice gives the
/// same result.
pub type ReduceFn<S> = fn(S, &Event) -> S;

/// Left-fold `events` over `initial` in the order given.
pub fn fold<'a, S, I>(events: I, initial: S, reducer: ReduceFn<S>) -> S
where
    I: IntoIterator<Item = &'a Event>,
{
    events.into_iter().fold(initial, reducer)
}

/// Rebuild state from events in log order.
///
/// # Examples
///
/// ```
/// use contactfold::{replay, Contact, ContactKind, Event, EventKind, State};
/// use serde_json::json;
///
/// let john = Contact::new(0, "John", "john@example.com", ContactKind::Lead);
/// let events = vec![
///     Event::new(EventKind::ContactAdded(john)),
///     Event::new(EventKind::ContactUpdated {
///         contact_id: 0,
///         updates: json!({"type": "customer"}).as_object().cloned().unwrap(),
///     }),
/// ];
///
/// let state = replay(&events, State::default());
/// assert!(state.contacts[0].is_customer());
/// ```
pub fn replay(events: &[Event], initial: State) -> State {
    fold(events, initial, apply)
}

/// Apply a single event to the whole state.
pub fn apply(state: State, event: &Event) -> State {
    State {
        contacts: apply_to_contacts(state.contacts, event),
        communications: apply_to_communications(state.communications, event),
    }
}

/// Apply an event to the contact list. Events about communications pass
/// through untouched.
pub fn apply_to_contacts(mut contacts: Vec<Contact>, event: &Event) -> Vec<Contact> {
    match &event.kind {
        EventKind::ContactAdded(contact) => contacts.push(contact.clone()),
        EventKind::ContactUpdated {
            contact_id,
            updates,
        } => {
            if let Some(contact) = contacts.iter_mut().find(|c| c.id == *contact_id) {
                match contact.merged(updates) {
                    Ok(merged) => *contact = merged,
                    Err(e) => log::warn!(
                        "event {}: skipping update to contact {contact_id}: {e}",
                        event.id
                    ),
                }
            }
        }
        EventKind::Unknown { event_type, .. } => {
            log::debug!("event {}: ignoring unknown type {event_type}", event.id);
        }
        EventKind::CommunicationRecorded(_) | EventKind::CommunicationUpdated { .. } => {}
    }
    contacts
}

/// Apply an event to the communication list.
///
/// `COMMUNICATION_UPDATED` stamps `updated_at` with the event's own
/// timestamp, never the current time.
pub fn apply_to_communications(
    mut communications: Vec<Communication>,
    event: &Event,
) -> Vec<Communication> {
    match &event.kind {
        EventKind::CommunicationRecorded(comm) => communications.push(comm.clone()),
        EventKind::CommunicationUpdated {
            communication_id,
            updates,
            ..
        } => {
            if let Some(comm) = communications
                .iter_mut()
                .find(|c| c.id == *communication_id)
            {
                match comm.merged(updates) {
                    Ok(mut merged) => {
                        merged.updated_at = Some(event.timestamp);
                        *comm = merged;
                    }
                    Err(e) => log::warn!(
                        "event {}: skipping update to communication {communication_id}: {e}",
                        event.id
                    ),
                }
            }
        }
        EventKind::ContactAdded(_) | EventKind::ContactUpdated { .. } | EventKind::Unknown { .. } => {}
    }
    communications
}
