use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the event log and the store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A command referenced an entity that is not in the current state.
    /// Nothing was appended to the log.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    /// Rewriting the log file failed.
    ///
    /// The in-memory log already holds the new event, so memory is ahead of
    /// disk. Treat this as fatal for the process and reload from disk.
    #[error("failed to write event log {}: {source}", path.display())]
    DurableWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading the log file failed for a reason other than it being absent.
    #[error("failed to read event log {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The log file exists but is not a JSON array of events.
    #[error("malformed event log {}: {source}", path.display())]
    MalformedLog {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Another writer holds the lock on this log.
    #[error("another writer holds the lock on {}", path.display())]
    Locked { path: PathBuf },

    /// An update could not be merged into the entity it targets.
    #[error("invalid update for {entity} {id}: {reason}")]
    InvalidUpdate {
        entity: &'static str,
        id: u64,
        reason: String,
    },

    /// A command ran before [`Store::initialize`](crate::Store::initialize).
    #[error("store is not initialized")]
    NotInitialized,

    #[error("store is already initialized")]
    AlreadyInitialized,
}

pub type Result<T> = std::result::Result<T, Error>;
