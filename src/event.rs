use crate::model::{Channel, Communication, Contact, Direction, Updates};
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Payload schema version written on every new event.
pub const EVENT_VERSION: u32 = 1;

/// The closed set of event types the store knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    ContactAdded,
    ContactUpdated,
    CommunicationRecorded,
    CommunicationUpdated,
}

impl EventType {
    /// The tag written to the `"type"` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ContactAdded => "CONTACT_ADDED",
            EventType::ContactUpdated => "CONTACT_UPDATED",
            EventType::CommunicationRecorded => "COMMUNICATION_RECORDED",
            EventType::CommunicationUpdated => "COMMUNICATION_UPDATED",
        }
    }

    /// Parse a `"type"` tag. Returns `None` for tags this version does not know.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "CONTACT_ADDED" => Some(EventType::ContactAdded),
            "CONTACT_UPDATED" => Some(EventType::ContactUpdated),
            "COMMUNICATION_RECORDED" => Some(EventType::CommunicationRecorded),
            "COMMUNICATION_UPDATED" => Some(EventType::CommunicationUpdated),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a communication looked like before an update, kept in the
/// `COMMUNICATION_UPDATED` payload as an audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviousContent {
    #[serde(rename = "type")]
    pub channel: Channel,
    pub content: String,
    pub direction: Direction,
}

impl From<&Communication> for PreviousContent {
    fn from(comm: &Communication) -> Self {
        PreviousContent {
            channel: comm.channel,
            content: comm.content.clone(),
            direction: comm.direction,
        }
    }
}

/// The fact an event records, together with its payload.
///
/// Events whose tag is not one of the four known types are kept as
/// [`EventKind::Unknown`] so they survive a rewrite of the log; replay
/// ignores them.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    ContactAdded(Contact),
    ContactUpdated {
        contact_id: u64,
        updates: Updates,
    },
    CommunicationRecorded(Communication),
    CommunicationUpdated {
        communication_id: u64,
        updates: Updates,
        previous_content: Option<PreviousContent>,
    },
    Unknown {
        event_type: String,
        payload: Value,
    },
}

impl EventKind {
    /// The known type of this event, or `None` for [`EventKind::Unknown`].
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            EventKind::ContactAdded(_) => Some(EventType::ContactAdded),
            EventKind::ContactUpdated { .. } => Some(EventType::ContactUpdated),
            EventKind::CommunicationRecorded(_) => Some(EventType::CommunicationRecorded),
            EventKind::CommunicationUpdated { .. } => Some(EventType::CommunicationUpdated),
            EventKind::Unknown { .. } => None,
        }
    }

    /// The `"type"` tag as written to the log.
    pub fn type_name(&self) -> &str {
        match self {
            EventKind::Unknown { event_type, .. } => event_type,
            known => known.event_type().map(|t| t.as_str()).unwrap_or_default(),
        }
    }
}

/// An immutable record of a command that succeeded.
///
/// Serialized as `{id, type, payload, timestamp, version, metadata}`. Once
/// appended to an [`EventLog`](crate::EventLog), an event is never changed.
///
/// # Examples
///
/// ```
/// use contactfold::{Contact, ContactKind, Event, EventKind, EventType};
///
/// let contact = Contact::new(0, "John", "john@example.com", ContactKind::Lead);
/// let event = Event::new(EventKind::ContactAdded(contact));
/// assert_eq!(event.event_type(), Some(EventType::ContactAdded));
/// assert_eq!(event.version, 1);
/// assert_eq!(event.summary(), "Added contact: John (lead)");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawEvent")]
pub struct Event {
    /// Unique identifier (UUID v4 for events created by this crate).
    pub id: String,
    pub kind: EventKind,
    /// Creation time. Used for audit and ordering queries, never for replay order.
    pub timestamp: DateTime<Utc>,
    pub version: u32,
    /// Free-form metadata, `{}` unless set.
    pub metadata: Map<String, Value>,
}

impl Event {
    /// Create an event with a fresh id, stamped with the current time.
    pub fn new(kind: EventKind) -> Self {
        Event {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            timestamp: Utc::now(),
            version: EVENT_VERSION,
            metadata: Map::new(),
        }
    }

    /// Override the creation time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn event_type(&self) -> Option<EventType> {
        self.kind.event_type()
    }

    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    /// Whether this event records or updates the given communication.
    pub fn references_communication(&self, communication_id: u64) -> bool {
        match &self.kind {
            EventKind::CommunicationRecorded(comm) => comm.id == communication_id,
            EventKind::CommunicationUpdated {
                communication_id: id,
                ..
            } => *id == communication_id,
            _ => false,
        }
    }

    /// One-line human readable description for history listings.
    pub fn summary(&self) -> String {
        match &self.kind {
            EventKind::ContactAdded(contact) => {
                format!("Added contact: {} ({})", contact.name, contact.kind)
            }
            EventKind::ContactUpdated { contact_id, .. } => {
                format!("Updated contact ID {contact_id}")
            }
            EventKind::CommunicationRecorded(comm) => {
                format!("{} communication with contact {}", comm.channel, comm.contact_id)
            }
            EventKind::CommunicationUpdated {
                communication_id, ..
            } => format!("Updated communication ID {communication_id}"),
            EventKind::Unknown { .. } => "Unknown event".to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContactUpdatedRef<'a> {
    contact_id: u64,
    updates: &'a Updates,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommunicationUpdatedRef<'a> {
    communication_id: u64,
    updates: &'a Updates,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_content: Option<&'a PreviousContent>,
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Event", 6)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("type", self.type_name())?;
        match &self.kind {
            EventKind::ContactAdded(contact) => s.serialize_field("payload", contact)?,
            EventKind::ContactUpdated {
                contact_id,
                updates,
            } => s.serialize_field(
                "payload",
                &ContactUpdatedRef {
                    contact_id: *contact_id,
                    updates,
                },
            )?,
            EventKind::CommunicationRecorded(comm) => s.serialize_field("payload", comm)?,
            EventKind::CommunicationUpdated {
                communication_id,
                updates,
                previous_content,
            } => s.serialize_field(
                "payload",
                &CommunicationUpdatedRef {
                    communication_id: *communication_id,
                    updates,
                    previous_content: previous_content.as_ref(),
                },
            )?,
            EventKind::Unknown { payload, .. } => s.serialize_field("payload", payload)?,
        }
        s.serialize_field("timestamp", &self.timestamp)?;
        s.serialize_field("version", &self.version)?;
        s.serialize_field("metadata", &self.metadata)?;
        s.end()
    }
}

/// Wire shape of an event before its payload is interpreted.
#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    payload: Value,
    timestamp: DateTime<Utc>,
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    metadata: Map<String, Value>,
}

fn default_version() -> u32 {
    EVENT_VERSION
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContactUpdatedPayload {
    contact_id: u64,
    #[serde(default)]
    updates: Updates,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommunicationUpdatedPayload {
    communication_id: u64,
    #[serde(default)]
    updates: Updates,
    #[serde(default)]
    previous_content: Option<PreviousContent>,
}

impl TryFrom<RawEvent> for Event {
    type Error = serde_json::Error;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let kind = match EventType::parse(&raw.event_type) {
            Some(EventType::ContactAdded) => {
                EventKind::ContactAdded(serde_json::from_value(raw.payload)?)
            }
            Some(EventType::ContactUpdated) => {
                let p: ContactUpdatedPayload = serde_json::from_value(raw.payload)?;
                EventKind::ContactUpdated {
                    contact_id: p.contact_id,
                    updates: p.updates,
                }
            }
            Some(EventType::CommunicationRecorded) => {
                EventKind::CommunicationRecorded(serde_json::from_value(raw.payload)?)
            }
            Some(EventType::CommunicationUpdated) => {
                let p: CommunicationUpdatedPayload = serde_json::from_value(raw.payload)?;
                EventKind::CommunicationUpdated {
                    communication_id: p.communication_id,
                    updates: p.updates,
                    previous_content: p.previous_content,
                }
            }
            None => EventKind::Unknown {
                event_type: raw.event_type,
                payload: raw.payload,
            },
        };

        Ok(Event {
            id: raw.id,
            kind,
            timestamp: raw.timestamp,
            version: raw.version,
            metadata: raw.metadata,
        })
    }
}
