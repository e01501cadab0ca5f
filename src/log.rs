use crate::error::{Error, Result};
use crate::event::{Event, EventType};
use crate::persist;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// How an [`EventLog`] guards its file against other writers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockMode {
    /// Hold an exclusive advisory lock on `<path>.lock` while the log is open.
    /// A second log opened on the same path fails with [`Error::Locked`].
    #[default]
    Exclusive,
    /// No locking. Concurrent writers can lose each other's events.
    None,
}

/// Ordered, append-only log of events backed by a single JSON array file.
///
/// The whole array is kept in memory and the file is rewritten atomically on
/// every append. Events are never changed or removed once appended.
///
/// # Examples
///
/// ```
/// use contactfold::{Contact, ContactKind, Event, EventKind, EventLog};
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("events.json");
///
/// let mut log = EventLog::open(&path).unwrap();
/// assert!(log.load().unwrap().is_empty());
///
/// let contact = Contact::new(0, "John", "john@example.com", ContactKind::Lead);
/// log.append(Event::new(EventKind::ContactAdded(contact))).unwrap();
/// drop(log);
///
/// let mut reopened = EventLog::open(&path).unwrap();
/// assert_eq!(reopened.load().unwrap().len(), 1);
/// ```
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    events: Vec<Event>,
    _lock: Option<File>,
}

impl EventLog {
    /// Open the log at `path` with an exclusive lock. Does not read the file;
    /// call [`load`](Self::load) for that.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] if another writer holds the lock, or
    /// [`Error::Read`] if the lock file cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_lock(path, LockMode::Exclusive)
    }

    /// Open the log at `path` with the given lock mode.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_with_lock(path: impl AsRef<Path>, lock_mode: LockMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock = match lock_mode {
            LockMode::Exclusive => Some(acquire_lock(&path)?),
            LockMode::None => None,
        };

        Ok(EventLog {
            path,
            events: Vec::new(),
            _lock: lock,
        })
    }

    /// Read the backing file into memory, replacing whatever was held.
    ///
    /// A missing or blank file is an empty log.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] if the file exists but cannot be read, and
    /// [`Error::MalformedLog`] if it is not a JSON array of events.
    pub fn load(&mut self) -> Result<&[Event]> {
        let contents = persist::read_optional(&self.path).map_err(|source| Error::Read {
            path: self.path.clone(),
            source,
        })?;

        self.events = match contents {
            Some(text) if !text.trim().is_empty() => {
                serde_json::from_str(&text).map_err(|source| Error::MalformedLog {
                    path: self.path.clone(),
                    source,
                })?
            }
            _ => Vec::new(),
        };

        if let Err(e) = persist::remove_stale_tmp(&self.path) {
            log::warn!(
                "could not remove stale temp file for {}: {e}",
                self.path.display()
            );
        }

        log::debug!("loaded {} events from {}", self.events.len(), self.path.display());
        Ok(&self.events)
    }

    /// Append one event and durably rewrite the log before returning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DurableWrite`] if the rewrite fails. The event has
    /// already been added in memory at that point, so memory is ahead of
    /// disk and the process should reload from disk.
    pub fn append(&mut self, event: Event) -> Result<&Event> {
        self.events.push(event);
        self.save()?;
        let index = self.events.len() - 1;
        Ok(&self.events[index])
    }

    /// Append several events with a single rewrite at the end.
    ///
    /// # Errors
    ///
    /// Same as [`append`](Self::append).
    pub fn append_many(&mut self, events: Vec<Event>) -> Result<&[Event]> {
        let start = self.events.len();
        self.events.extend(events);
        self.save()?;
        Ok(&self.events[start..])
    }

    /// All events in append order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// An owned copy of every event. Changing it does not affect the log.
    pub fn get_all(&self) -> Vec<Event> {
        self.events.clone()
    }

    /// Events of the given type, in append order.
    pub fn get_by_type(&self, event_type: EventType) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == Some(event_type))
            .collect()
    }

    /// Events stamped strictly after `since`, in append order.
    pub fn get_since(&self, since: DateTime<Utc>) -> Vec<&Event> {
        self.events.iter().filter(|e| e.timestamp > since).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        let write = serde_json::to_vec_pretty(&self.events)
            .map_err(io::Error::from)
            .and_then(|json| persist::write_atomic(&self.path, &json));

        write.map_err(|source| {
            log::error!(
                "event log {} is behind memory ({} events held): {source}",
                self.path.display(),
                self.events.len()
            );
            Error::DurableWrite {
                path: self.path.clone(),
                source,
            }
        })
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

fn acquire_lock(path: &Path) -> Result<File> {
    let lock_path = lock_path(path);
    let read_err = |source| Error::Read {
        path: lock_path.clone(),
        source,
    };

    if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(read_err)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(read_err)?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(Error::Locked {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(read_err(e)),
    }
}
