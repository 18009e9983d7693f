//! Audit history of entity changes
//!
//! - [`codec`] turns entities into comparable [`Snapshot`]s
//! - [`record`] defines the immutable [`HistoryRecord`]
//! - [`store`] is the append-only [`HistoryStore`] contract, with
//!   [`MemoryStore`] and [`SqliteStore`] implementations
//! - [`recorder`] is the [`HistoryRecorder`] facade domain code calls

pub mod clock;
pub mod codec;
pub mod error;
pub mod events;
pub mod memory;
pub mod record;
pub mod recorder;
pub mod sqlite;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{decode, encode, Snapshot};
pub use error::{EncodingError, RecordingError, StoreError, ValidationError};
pub use events::{AttemptState, EventSink, RecorderEvent, TracingSink};
pub use memory::MemoryStore;
pub use record::{ActionStatus, ChangeType, HistoryRecord};
pub use recorder::{HistoryRecorder, RetryPolicy};
pub use sqlite::SqliteStore;
pub use store::{
    AppendRequest, EntityHistory, HistoryIter, HistoryQuery, HistoryStore, RecordId,
    StoredRecord, TimeRange,
};
