//! Ephemeral object storage.
//!
//! Generated files (PDFs and the like) are handed to the store, kept for a
//! fixed retention window, served to anyone holding their id, and deleted
//! once the window closes, whether or not they were ever fetched.
//!
//! # Components
//!
//! - [`EphemeralStore`] — put / get / evict plus the expiry pass
//! - [`ExpirySchedule`] — live-object index and deadline min-heap
//! - [`ExpiryLoop`] — single background task driving expiry
//! - [`Backend`] — storage seam; [`FsBackend`] keeps one file per object
//! - [`Clock`] — injectable time source ([`SystemClock`], [`ManualClock`])
//!
//! # Design Rules
//!
//! 1. Ids are generated by the store from the OS CSPRNG; callers never pick them.
//! 2. Display names are cosmetic and never touch a filesystem path.
//! 3. Writes are staged and then linked into place; readers never see a prefix.
//! 4. Unknown, malformed, and expired ids are indistinguishable (`NotFound`).
//! 5. Each object is deleted exactly once; deleting an absent file is success.
//! 6. Background deletion failures are retried once, then abandoned with a
//!    warning. They never surface to request handlers.
//! 7. Files left behind by a previous process are reconciled on open
//!    ([`StartupPolicy::Sweep`]).

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod expiry;
pub mod fs;
pub mod schedule;
pub mod store;

// Re-export primary types at crate root for ergonomic imports.
pub use backend::{Backend, BackingEntry, BackingReader};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{StartupPolicy, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use expiry::ExpiryLoop;
pub use fs::FsBackend;
pub use schedule::{ExpirySchedule, ObjectMeta, ReadLease};
pub use store::{EphemeralStore, ObjectReader, ReapReport, StoreStats, StoredObject, SweepReport};
