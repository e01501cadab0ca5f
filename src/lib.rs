mod error;
mod event;
mod log;
mod model;
mod persist;
pub mod replay;
mod store;
mod stream;

pub use error::{Error, Result};
pub use event::{Event, EventKind, EventType, PreviousContent, EVENT_VERSION};
pub use crate::log::{EventLog, LockMode};
pub use model::{Channel, Communication, Contact, ContactKind, Direction, State, Updates};
pub use replay::{apply, fold, replay, ReduceFn};
pub use store::{ContactActivity, HistoryEntry, Stats, Store, StoreBuilder};
pub use stream::{Stream, Subscription};
