//! Entities folded out of the event log.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A partial set of fields to shallow-merge into an entity.
///
/// Keys are not checked against the entity's fields: unknown keys are kept
/// in the entity's `extra` map.
pub type Updates = Map<String, Value>;

/// Whether a contact is still a lead or has become a customer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    #[default]
    Lead,
    Customer,
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::Lead => "lead",
            ContactKind::Customer => "customer",
        }
    }
}

impl fmt::Display for ContactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The medium a communication happened over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Call,
    Meeting,
    Note,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Call => "call",
            Channel::Meeting => "meeting",
            Channel::Note => "note",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    #[default]
    Outbound,
}

/// A person tracked by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: u64,
    pub name: String,
    pub email: String,
    /// Serialized as `"type"`.
    #[serde(rename = "type")]
    pub kind: ContactKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Fields set by updates that are not part of the contact schema.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Contact {
    /// Create a contact stamped with the current time and no tags.
    pub fn new(id: u64, name: &str, email: &str, kind: ContactKind) -> Self {
        Contact {
            id,
            name: name.to_string(),
            email: email.to_string(),
            kind,
            created_at: Utc::now(),
            tags: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Return a copy of this contact with `updates` shallow-merged over it.
    ///
    /// # Errors
    ///
    /// Fails if an update gives a known field a value of the wrong shape,
    /// such as `{"type": 5}`.
    pub fn merged(&self, updates: &Updates) -> Result<Self, serde_json::Error> {
        shallow_merge(self, updates)
    }

    pub fn is_lead(&self) -> bool {
        self.kind == ContactKind::Lead
    }

    pub fn is_customer(&self) -> bool {
        self.kind == ContactKind::Customer
    }
}

/// A recorded interaction with a contact.
///
/// `contact_id` is not checked against the known contacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Communication {
    pub id: u64,
    pub contact_id: u64,
    /// Serialized as `"type"`.
    #[serde(rename = "type")]
    pub channel: Channel,
    pub content: String,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    /// Timestamp of the event that last updated this communication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Communication {
    /// Create a communication stamped with the current time.
    pub fn new(
        id: u64,
        contact_id: u64,
        channel: Channel,
        content: &str,
        direction: Direction,
    ) -> Self {
        Communication {
            id,
            contact_id,
            channel,
            content: content.to_string(),
            direction,
            timestamp: Utc::now(),
            updated_at: None,
            extra: Map::new(),
        }
    }

    /// Return a copy with `updates` shallow-merged over it.
    ///
    /// `updated_at` is left as the merge produced it; stamping is the
    /// caller's job.
    ///
    /// # Errors
    ///
    /// Fails if an update gives a known field a value of the wrong shape.
    pub fn merged(&self, updates: &Updates) -> Result<Self, serde_json::Error> {
        shallow_merge(self, updates)
    }
}

/// The reduced state of the whole log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub contacts: Vec<Contact>,
    pub communications: Vec<Communication>,
}

impl State {
    /// Largest entity id across contacts and communications.
    pub fn max_id(&self) -> Option<u64> {
        let contacts = self.contacts.iter().map(|c| c.id);
        let communications = self.communications.iter().map(|c| c.id);
        contacts.chain(communications).max()
    }
}

fn shallow_merge<T>(entity: &T, updates: &Updates) -> Result<T, serde_json::Error>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = serde_json::to_value(entity)?;
    if let Value::Object(fields) = &mut value {
        for (key, update) in updates {
            fields.insert(key.clone(), update.clone());
        }
    }
    serde_json::from_value(value)
}
