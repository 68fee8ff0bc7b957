use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ephemera_types::ObjectId;
use tokio::io::AsyncRead;

use crate::error::StoreResult;

/// An open backing object, ready to stream.
pub struct BackingReader {
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
    /// Size in bytes at open time.
    pub len: u64,
}

impl fmt::Debug for BackingReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackingReader")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// One entry found while listing the backing store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackingEntry {
    /// Raw entry name. Not yet validated as an [`ObjectId`].
    pub name: String,
    pub len: u64,
    pub modified: DateTime<Utc>,
}

/// Storage the ephemeral store writes objects into.
///
/// All implementations must satisfy these invariants:
/// - `write_new` is atomic: a concurrent `open` sees either nothing or the
///   complete payload, never a prefix.
/// - `write_new` never overwrites. An existing object under the same id is
///   reported as [`StoreError::IdCollision`](crate::StoreError::IdCollision).
/// - `remove` of an absent object succeeds with `false`.
/// - Objects are addressed by id only; the backend never sees display names.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Atomically create a new object holding `payload`.
    async fn write_new(&self, id: &ObjectId, payload: Bytes) -> StoreResult<()>;

    /// Open an object for streaming. Returns `Ok(None)` if it does not exist.
    async fn open(&self, id: &ObjectId) -> StoreResult<Option<BackingReader>>;

    /// Delete an object. Returns `true` if it existed.
    async fn remove(&self, id: &ObjectId) -> StoreResult<bool>;

    /// List committed objects (staging leftovers excluded).
    async fn list(&self) -> StoreResult<Vec<BackingEntry>>;

    /// Discard partially written objects left behind by a crash.
    /// Returns how many were removed.
    async fn clear_staging(&self) -> StoreResult<usize>;
}
