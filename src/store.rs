use crate::error::{Error, Result};
use crate::event::{Event, EventKind, EventType, PreviousContent};
use crate::log::{EventLog, LockMode};
use crate::model::{Channel, Communication, Contact, ContactKind, Direction, State, Updates};
use crate::replay::{apply_to_communications, apply_to_contacts, replay};
use crate::stream::Stream;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

const DEFAULT_RECENT_LIMIT: usize = 10;

/// A contact together with everything recorded against it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactActivity {
    #[serde(flatten)]
    pub contact: Contact,
    pub communications: Vec<Communication>,
    /// The communication with the latest timestamp, if any.
    pub last_communication: Option<Communication>,
}

/// One line of the audit history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub summary: String,
}

/// Headline counts over the current state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_contacts: usize,
    pub leads_count: usize,
    pub customers_count: usize,
    pub communications_count: usize,
}

/// Builder for configuring a [`Store`] before opening it.
///
/// Created via [`Store::builder`].
#[derive(Debug)]
pub struct StoreBuilder {
    path: PathBuf,
    lock_mode: LockMode,
    recent_limit: usize,
}

impl StoreBuilder {
    /// How the event log file is locked. Defaults to [`LockMode::Exclusive`].
    pub fn lock_mode(mut self, lock_mode: LockMode) -> Self {
        self.lock_mode = lock_mode;
        self
    }

    /// How many communications the recent-communications stream keeps.
    /// Defaults to 10.
    pub fn recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit;
        self
    }

    /// Open the event log and wire up the streams.
    ///
    /// The store still needs [`Store::initialize`] before use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] if another writer holds the log.
    pub fn open(self) -> Result<Store> {
        let log = EventLog::open_with_lock(&self.path, self.lock_mode)?;
        Ok(Store::with_log(log, self.recent_limit))
    }
}

/// Event-sourced contact store.
///
/// Binds an [`EventLog`], [`replay`] and a fixed set of [`Stream`]s. Every
/// command appends its event to the log first and only then publishes the
/// new state, so a failed write never reaches subscribers.
///
/// Streams:
/// - contacts, communications: primary, set by commands
/// - leads, customers: contacts filtered by kind
/// - recent communications: newest first, capped at the configured limit
/// - contact activity: contacts joined with their communications
///
/// The store is single-threaded. Hosts serving concurrent requests must
/// serialize calls to the command methods themselves. Streams hold `Rc`
/// handles and boxed observers, so `Store` is neither `Send` nor `Sync` and
/// cannot sit behind a `Mutex` shared between threads. A multithreaded host
/// should own the store on one thread and send commands to it, for example
/// over a channel.
///
/// # Examples
///
/// ```
/// use contactfold::{ContactKind, Store};
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut store = Store::open(dir.path().join("crm-events.json")).unwrap();
/// store.initialize().unwrap();
///
/// let john = store
///     .add_contact("John", "john@example.com", ContactKind::Lead)
///     .unwrap();
/// assert_eq!(store.leads_stream().get().unwrap().len(), 1);
///
/// store.promote_lead_to_customer(john.id).unwrap();
/// assert_eq!(store.customers_stream().get().unwrap().len(), 1);
/// assert_eq!(store.events().len(), 2);
/// ```
#[derive(Debug)]
pub struct Store {
    log: EventLog,
    contacts: Stream<Vec<Contact>>,
    communications: Stream<Vec<Communication>>,
    leads: Stream<Vec<Contact>>,
    customers: Stream<Vec<Contact>>,
    recent_communications: Stream<Vec<Communication>>,
    contact_activity: Stream<Vec<ContactActivity>>,
    next_id: u64,
    initialized: bool,
}

impl Store {
    /// Create a builder for a store backed by the file at `path`.
    pub fn builder(path: impl AsRef<Path>) -> StoreBuilder {
        StoreBuilder {
            path: path.as_ref().to_path_buf(),
            lock_mode: LockMode::default(),
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }

    /// Open a store with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] if another writer holds the log.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder(path).open()
    }

    fn with_log(log: EventLog, recent_limit: usize) -> Self {
        let contacts: Stream<Vec<Contact>> = Stream::new();
        let communications: Stream<Vec<Communication>> = Stream::new();

        let leads = contacts.map(|all| of_kind(all, ContactKind::Lead));
        let customers = contacts.map(|all| of_kind(all, ContactKind::Customer));
        let recent_communications =
            communications.map(move |all| most_recent(all, recent_limit));
        let contact_activity: Stream<Vec<ContactActivity>> =
            contacts.combine(&communications, |contacts, comms| {
                contacts
                    .iter()
                    .map(|contact| activity_for(contact, comms))
                    .collect()
            });

        Store {
            log,
            contacts,
            communications,
            leads,
            customers,
            recent_communications,
            contact_activity,
            next_id: 0,
            initialized: false,
        }
    }

    /// Load the event log, replay it and publish the result to the primary
    /// streams. Returns the rebuilt state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyInitialized`] on a second call, and
    /// [`Error::Read`] or [`Error::MalformedLog`] if the log cannot be loaded.
    pub fn initialize(&mut self) -> Result<State> {
        if self.initialized {
            return Err(Error::AlreadyInitialized);
        }

        let events = self.log.load()?;
        let event_count = events.len();
        let state = replay(events, State::default());

        self.next_id = state.max_id().map_or(0, |id| id + 1);
        self.initialized = true;
        self.contacts.set(state.contacts.clone());
        self.communications.set(state.communications.clone());

        log::info!(
            "loaded {event_count} events from {}: {} contacts, {} communications",
            self.log.path().display(),
            state.contacts.len(),
            state.communications.len()
        );
        Ok(state)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Add a new contact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before [`initialize`](Self::initialize),
    /// or [`Error::DurableWrite`] if the log cannot be written.
    pub fn add_contact(&mut self, name: &str, email: &str, kind: ContactKind) -> Result<Contact> {
        self.ensure_initialized()?;
        let contact = Contact::new(self.allocate_id(), name, email, kind);
        self.commit(Event::new(EventKind::ContactAdded(contact.clone())))?;
        log::info!("contact added: {} (id {})", contact.name, contact.id);
        Ok(contact)
    }

    /// Shallow-merge `updates` into a contact. Returns the updates applied.
    ///
    /// An update for an unknown id is still recorded and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUpdate`] if `updates` is not a JSON object,
    /// contains an `id` key, or would give a field a value of the wrong
    /// shape. Nothing is appended in that case.
    pub fn update_contact(&mut self, contact_id: u64, updates: Value) -> Result<Updates> {
        self.ensure_initialized()?;
        let updates = as_updates("contact", contact_id, updates)?;

        let contacts = self.contacts.get().unwrap_or_default();
        if let Some(current) = contacts.iter().find(|c| c.id == contact_id) {
            current
                .merged(&updates)
                .map_err(|e| invalid_update("contact", contact_id, e))?;
        }

        self.commit(Event::new(EventKind::ContactUpdated {
            contact_id,
            updates: updates.clone(),
        }))?;
        log::info!("contact {contact_id} updated: {}", Value::Object(updates.clone()));
        Ok(updates)
    }

    /// Turn a lead into a customer. Promoting a customer again is harmless.
    ///
    /// # Errors
    ///
    /// Same as [`update_contact`](Self::update_contact).
    pub fn promote_lead_to_customer(&mut self, contact_id: u64) -> Result<Updates> {
        self.update_contact(contact_id, json!({ "type": ContactKind::Customer }))
    }

    /// Record a communication with a contact. The contact id is not checked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] or [`Error::DurableWrite`].
    pub fn record_communication(
        &mut self,
        contact_id: u64,
        channel: Channel,
        content: &str,
        direction: Direction,
    ) -> Result<Communication> {
        self.ensure_initialized()?;
        let comm = Communication::new(self.allocate_id(), contact_id, channel, content, direction);
        self.commit(Event::new(EventKind::CommunicationRecorded(comm.clone())))?;
        log::info!("{channel} communication {} recorded for contact {contact_id}", comm.id);
        Ok(comm)
    }

    /// Shallow-merge `updates` into a communication and stamp `updated_at`
    /// with the event's timestamp. The communication's prior type, content
    /// and direction are kept in the event for auditing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such communication is in the current
    /// state, or [`Error::InvalidUpdate`]; nothing is appended in either case.
    pub fn update_communication(
        &mut self,
        communication_id: u64,
        updates: Value,
    ) -> Result<Updates> {
        self.ensure_initialized()?;
        let updates = as_updates("communication", communication_id, updates)?;

        let current = self
            .communications
            .get()
            .unwrap_or_default()
            .into_iter()
            .find(|c| c.id == communication_id)
            .ok_or(Error::NotFound {
                entity: "communication",
                id: communication_id,
            })?;
        current
            .merged(&updates)
            .map_err(|e| invalid_update("communication", communication_id, e))?;

        self.commit(Event::new(EventKind::CommunicationUpdated {
            communication_id,
            updates: updates.clone(),
            previous_content: Some(PreviousContent::from(&current)),
        }))?;
        log::info!("communication {communication_id} updated");
        Ok(updates)
    }

    pub fn contacts_stream(&self) -> &Stream<Vec<Contact>> {
        &self.contacts
    }

    pub fn communications_stream(&self) -> &Stream<Vec<Communication>> {
        &self.communications
    }

    pub fn leads_stream(&self) -> &Stream<Vec<Contact>> {
        &self.leads
    }

    pub fn customers_stream(&self) -> &Stream<Vec<Contact>> {
        &self.customers
    }

    /// Communications newest first, capped at the configured limit.
    pub fn recent_communications_stream(&self) -> &Stream<Vec<Communication>> {
        &self.recent_communications
    }

    pub fn contact_activity_stream(&self) -> &Stream<Vec<ContactActivity>> {
        &self.contact_activity
    }

    /// All events in log order.
    pub fn events(&self) -> &[Event] {
        self.log.events()
    }

    pub fn events_by_type(&self, event_type: EventType) -> Vec<&Event> {
        self.log.get_by_type(event_type)
    }

    /// Events stamped strictly after `since`.
    pub fn events_since(&self, since: DateTime<Utc>) -> Vec<&Event> {
        self.log.get_since(since)
    }

    /// Every event as a timestamped one-line summary, in log order.
    pub fn event_history(&self) -> Vec<HistoryEntry> {
        self.log
            .events()
            .iter()
            .map(|event| HistoryEntry {
                timestamp: event.timestamp,
                event_type: event.type_name().to_string(),
                summary: event.summary(),
            })
            .collect()
    }

    /// The recorded event and every update for one communication, in log order.
    pub fn events_for_communication(&self, communication_id: u64) -> Vec<&Event> {
        self.log
            .events()
            .iter()
            .filter(|e| e.references_communication(communication_id))
            .collect()
    }

    pub fn communications_for_contact(&self, contact_id: u64) -> Vec<Communication> {
        self.communications
            .get()
            .unwrap_or_default()
            .into_iter()
            .filter(|c| c.contact_id == contact_id)
            .collect()
    }

    /// The current state as published on the primary streams.
    pub fn state(&self) -> State {
        State {
            contacts: self.contacts.get().unwrap_or_default(),
            communications: self.communications.get().unwrap_or_default(),
        }
    }

    pub fn stats(&self) -> Stats {
        let count = |stream: &Stream<Vec<Contact>>| stream.get().map_or(0, |v| v.len());
        Stats {
            total_contacts: count(&self.contacts),
            leads_count: count(&self.leads),
            customers_count: count(&self.customers),
            communications_count: self.communications.get().map_or(0, |v| v.len()),
        }
    }

    /// The underlying event log.
    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Append `event`, then publish it through the same appliers replay uses.
    fn commit(&mut self, event: Event) -> Result<()> {
        let event = self.log.append(event)?;
        match &event.kind {
            EventKind::ContactAdded(_) | EventKind::ContactUpdated { .. } => {
                let current = self.contacts.get().unwrap_or_default();
                self.contacts.set(apply_to_contacts(current, event));
            }
            EventKind::CommunicationRecorded(_) | EventKind::CommunicationUpdated { .. } => {
                let current = self.communications.get().unwrap_or_default();
                self.communications
                    .set(apply_to_communications(current, event));
            }
            EventKind::Unknown { .. } => {}
        }
        Ok(())
    }
}

fn as_updates(entity: &'static str, id: u64, updates: Value) -> Result<Updates> {
    match updates {
        Value::Object(fields) if fields.contains_key("id") => Err(Error::InvalidUpdate {
            entity,
            id,
            reason: "the id of an existing entity cannot be changed".to_string(),
        }),
        Value::Object(fields) => Ok(fields),
        other => Err(Error::InvalidUpdate {
            entity,
            id,
            reason: format!("updates must be a JSON object, got {other}"),
        }),
    }
}

fn invalid_update(entity: &'static str, id: u64, err: serde_json::Error) -> Error {
    Error::InvalidUpdate {
        entity,
        id,
        reason: err.to_string(),
    }
}

fn of_kind(contacts: &[Contact], kind: ContactKind) -> Vec<Contact> {
    contacts.iter().filter(|c| c.kind == kind).cloned().collect()
}

fn most_recent(communications: &[Communication], limit: usize) -> Vec<Communication> {
    let mut recent = communications.to_vec();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent.truncate(limit);
    recent
}

fn activity_for(contact: &Contact, communications: &[Communication]) -> ContactActivity {
    let communications: Vec<Communication> = communications
        .iter()
        .filter(|c| c.contact_id == contact.id)
        .cloned()
        .collect();
    // Ties go to the earliest in log order, matching `most_recent`.
    let last_communication = communications
        .iter()
        .min_by(|a, b| b.timestamp.cmp(&a.timestamp))
        .cloned();
    ContactActivity {
        contact: contact.clone(),
        communications,
        last_communication,
    }
}
