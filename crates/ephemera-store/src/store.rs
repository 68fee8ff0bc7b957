use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use ephemera_types::{DisplayName, IdSpec, NamePolicy, ObjectId, RetrievalRef};
use serde::Serialize;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::clock::{Clock, SystemClock};
use crate::config::{StartupPolicy, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::fs::FsBackend;
use crate::schedule::{ExpirySchedule, ObjectMeta, ReadLease};

/// Result of a successful [`EphemeralStore::put`].
#[derive(Clone, Debug, Serialize)]
pub struct StoredObject {
    pub meta: ObjectMeta,
    pub reference: RetrievalRef,
}

/// Streaming view of an active object.
///
/// Holds a read lease: while any reader for an object is alive, expiry takes
/// the object out of the index but leaves the backing file in place.
pub struct ObjectReader {
    meta: ObjectMeta,
    len: u64,
    inner: Pin<Box<dyn AsyncRead + Send>>,
    _lease: ReadLease,
}

impl ObjectReader {
    pub fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    /// Byte length of the stream.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsyncRead for ObjectReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.inner.as_mut().poll_read(cx, buf)
    }
}

impl fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReader")
            .field("id", &self.meta.id)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Outcome of one expiry pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    /// Objects whose deadline passed during this pass.
    pub expired: usize,
    /// Backing files deleted (or found already absent).
    pub removed: usize,
    /// Deletions that failed and were queued for their single retry.
    pub retried: usize,
    /// Deletions that failed on retry and were given up on.
    pub abandoned: usize,
    /// Expired objects still waiting for readers to finish.
    pub draining: usize,
}

impl ReapReport {
    pub fn is_idle(&self) -> bool {
        self.expired == 0 && self.removed == 0 && self.retried == 0 && self.abandoned == 0
    }
}

/// Outcome of reconciling the backing store with the index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Partial writes discarded from staging.
    pub staging_cleared: usize,
    /// Objects older than the retention window, deleted.
    pub expired_removed: usize,
    /// Objects still inside their window, scheduled again.
    pub rescheduled: usize,
    /// Entries whose names are not object ids; left untouched.
    pub foreign: usize,
}

/// Point-in-time counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub active: usize,
    pub draining: usize,
    pub next_expiry: Option<DateTime<Utc>>,
}

/// An object out of the index whose backing file is not yet deleted.
#[derive(Debug)]
struct PendingRemoval {
    id: ObjectId,
    lease: ReadLease,
    failures: u8,
    not_before: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct StoreState {
    schedule: ExpirySchedule,
    removals: Vec<PendingRemoval>,
}

/// Store for short-lived binary objects.
///
/// Objects are written atomically under a random id, served any number of
/// times until their retention window ends, and then deleted by the expiry
/// pass ([`reap_expired`](Self::reap_expired), normally driven by
/// [`ExpiryLoop`](crate::ExpiryLoop)).
///
/// All state lives in the instance: configuration, clock, and backend are
/// injected, so tests get isolated stores with simulated time.
pub struct EphemeralStore {
    config: StoreConfig,
    id_spec: IdSpec,
    names: NamePolicy,
    retention: chrono::Duration,
    retry_delay: chrono::Duration,
    clock: Arc<dyn Clock>,
    backend: Arc<dyn Backend>,
    state: Mutex<StoreState>,
    wake: Notify,
}

impl EphemeralStore {
    /// Validate `config`, then apply the configured [`StartupPolicy`].
    pub async fn open(
        config: StoreConfig,
        clock: Arc<dyn Clock>,
        backend: Arc<dyn Backend>,
    ) -> StoreResult<Self> {
        config.validate()?;
        let to_chrono = |d: Duration| {
            chrono::Duration::from_std(d).map_err(|e| StoreError::Config(e.to_string()))
        };

        let store = Self {
            id_spec: config.id_spec()?,
            names: config.name_policy(),
            retention: to_chrono(config.retention())?,
            retry_delay: to_chrono(config.delete_retry_delay())?,
            clock,
            backend,
            state: Mutex::new(StoreState::default()),
            wake: Notify::new(),
            config,
        };

        if store.config.startup == StartupPolicy::Sweep {
            let report = store.sweep().await?;
            info!(
                staging_cleared = report.staging_cleared,
                expired_removed = report.expired_removed,
                rescheduled = report.rescheduled,
                foreign = report.foreign,
                "startup sweep complete"
            );
        }
        Ok(store)
    }

    /// Open a store on the configured directory with the system clock.
    pub async fn open_fs(config: StoreConfig) -> StoreResult<Self> {
        let backend = FsBackend::new(&config.directory)?;
        Self::open(config, Arc::new(SystemClock), Arc::new(backend)).await
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Store `payload` under a fresh id and schedule its expiry.
    pub async fn put(&self, payload: Bytes, suggested_name: &str) -> StoreResult<StoredObject> {
        if payload.is_empty() {
            return Err(StoreError::InvalidInput("payload must not be empty".into()));
        }
        let size = payload.len() as u64;
        if size > self.config.max_object_size {
            return Err(StoreError::PayloadTooLarge {
                size,
                max: self.config.max_object_size,
            });
        }

        let name = DisplayName::sanitize(suggested_name, &self.names);
        let id = self.id_spec.generate();
        if self.is_tracked(&id) {
            warn!(id = %id.short(), "generated id already in use");
            return Err(StoreError::IdCollision);
        }

        let created_at = self.clock.now();
        let expires_at = created_at
            .checked_add_signed(self.retention)
            .ok_or_else(|| StoreError::Config("retention window overflows the clock".into()))?;

        self.backend.write_new(&id, payload).await?;

        let meta = ObjectMeta {
            id: id.clone(),
            name: name.clone(),
            size,
            created_at,
            expires_at,
        };

        let earliest = {
            let mut state = self.lock();
            if !state.schedule.insert(meta.clone()) {
                return Err(StoreError::IdCollision);
            }
            state.schedule.next_deadline() == Some(meta.expires_at)
        };
        if earliest {
            self.wake.notify_one();
        }

        debug!(id = %id.short(), size, name = %name, expires_at = %meta.expires_at, "object stored");
        Ok(StoredObject {
            reference: RetrievalRef::new(id, name),
            meta,
        })
    }

    /// Open an active object for streaming.
    ///
    /// Malformed, unknown, expired, and evicted ids all produce the same
    /// [`StoreError::NotFound`].
    pub async fn get(&self, raw_id: &str) -> StoreResult<ObjectReader> {
        let Ok(id) = self.id_spec.parse(raw_id) else {
            return Err(StoreError::NotFound);
        };

        let (meta, lease) = {
            let now = self.clock.now();
            self.lock()
                .schedule
                .lookup_active(&id, now)
                .ok_or(StoreError::NotFound)?
        };

        let backing = self.backend.open(&id).await?.ok_or(StoreError::NotFound)?;
        Ok(ObjectReader {
            meta,
            len: backing.len,
            inner: backing.reader,
            _lease: lease,
        })
    }

    /// Read a whole object into memory.
    pub async fn get_bytes(&self, raw_id: &str) -> StoreResult<Vec<u8>> {
        use tokio::io::AsyncReadExt;

        let mut reader = self.get(raw_id).await?;
        let mut buf = Vec::with_capacity(reader.len() as usize);
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Evict an object ahead of its deadline.
    ///
    /// Returns `true` if a live object was evicted. Evicting an unknown or
    /// already-evicted id returns `false`.
    pub async fn evict(&self, raw_id: &str) -> StoreResult<bool> {
        let Ok(id) = self.id_spec.parse(raw_id) else {
            return Ok(false);
        };

        let lease = {
            let mut state = self.lock();
            let Some(obj) = state.schedule.cancel(&id) else {
                return Ok(false);
            };
            if !obj.lease.is_idle() {
                debug!(id = %id.short(), "evicted while being read; draining");
                state.removals.push(PendingRemoval {
                    id,
                    lease: obj.lease,
                    failures: 0,
                    not_before: self.clock.now(),
                });
                return Ok(true);
            }
            obj.lease
        };

        match self.backend.remove(&id).await {
            Ok(_) => {
                debug!(id = %id.short(), "object evicted");
                Ok(true)
            }
            Err(e) => {
                self.lock().removals.push(PendingRemoval {
                    id,
                    lease,
                    failures: 1,
                    not_before: self.clock.now() + self.retry_delay,
                });
                Err(e)
            }
        }
    }

    /// Run one expiry pass.
    ///
    /// Takes due objects out of the index, then deletes every pending backing
    /// file that has no readers left. Failures are retried once on a later
    /// pass and then abandoned; nothing here returns an error.
    pub async fn reap_expired(&self) -> ReapReport {
        let mut report = ReapReport::default();
        let now = self.clock.now();

        let ready = {
            let mut state = self.lock();
            let due = state.schedule.pop_due(now);
            report.expired = due.len();
            for obj in due {
                state.removals.push(PendingRemoval {
                    id: obj.meta.id,
                    lease: obj.lease,
                    failures: 0,
                    not_before: now,
                });
            }

            let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.removals)
                .into_iter()
                .partition(|p| p.lease.is_idle() && p.not_before <= now);
            state.removals = waiting;
            ready
        };

        for pending in ready {
            match self.backend.remove(&pending.id).await {
                Ok(existed) => {
                    debug!(id = %pending.id.short(), existed, "expired object removed");
                    report.removed += 1;
                }
                Err(e) if pending.failures == 0 => {
                    warn!(id = %pending.id.short(), error = %e, "failed to remove expired object; will retry once");
                    report.retried += 1;
                    self.lock().removals.push(PendingRemoval {
                        failures: 1,
                        not_before: now + self.retry_delay,
                        ..pending
                    });
                }
                Err(e) => {
                    warn!(id = %pending.id.short(), error = %e, "failed to remove expired object again; abandoning");
                    report.abandoned += 1;
                }
            }
        }

        report.draining = self.lock().removals.len();
        report
    }

    /// Reconcile the backing store with the index.
    ///
    /// Clears staging leftovers, deletes objects whose modification time is
    /// older than the retention window, and schedules the remainder at
    /// `mtime + retention`. Recovered objects get the fallback display name.
    /// Objects this store has already taken out of service are skipped, so a
    /// sweep on a running store never revives or unlinks them early.
    pub async fn sweep(&self) -> StoreResult<SweepReport> {
        let mut report = SweepReport {
            staging_cleared: self.backend.clear_staging().await?,
            ..SweepReport::default()
        };
        let now = self.clock.now();

        for entry in self.backend.list().await? {
            let Ok(id) = self.id_spec.parse(&entry.name) else {
                debug!(name = %entry.name, "ignoring foreign entry");
                report.foreign += 1;
                continue;
            };
            if self.is_tracked(&id) {
                continue;
            }

            let Some(expires_at) = entry.modified.checked_add_signed(self.retention) else {
                warn!(id = %id.short(), modified = %entry.modified, "modification time out of range; leaving in place");
                continue;
            };
            if expires_at <= now {
                match self.backend.remove(&id).await {
                    Ok(_) => report.expired_removed += 1,
                    Err(e) => warn!(id = %id.short(), error = %e, "failed to remove stale object"),
                }
                continue;
            }

            let meta = ObjectMeta {
                id,
                name: DisplayName::fallback(&self.names),
                size: entry.len,
                created_at: entry.modified,
                expires_at,
            };
            if self.lock().schedule.insert(meta) {
                report.rescheduled += 1;
            }
        }

        if report.rescheduled > 0 {
            self.wake.notify_one();
        }
        Ok(report)
    }

    pub fn stats(&self) -> StoreStats {
        let mut state = self.lock();
        StoreStats {
            active: state.schedule.len(),
            draining: state.removals.len(),
            next_expiry: state.schedule.next_deadline(),
        }
    }

    /// Every active object, earliest deadline first.
    pub fn pending(&self) -> Vec<ObjectMeta> {
        self.lock().schedule.pending()
    }

    /// How long the expiry loop may sleep before the next pass is due,
    /// capped at the configured tick interval.
    pub fn next_wakeup(&self) -> Duration {
        let tick = self.config.tick_interval();
        let now = self.clock.now();
        let mut state = self.lock();

        let next_removal = state
            .removals
            .iter()
            .filter(|p| p.lease.is_idle())
            .map(|p| p.not_before)
            .min();
        let next = match (state.schedule.next_deadline(), next_removal) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        match next {
            Some(at) => (at - now).to_std().unwrap_or(Duration::ZERO).min(tick),
            None => tick,
        }
    }

    /// Resolves when a put or sweep introduces a new earliest deadline.
    pub(crate) async fn deadline_changed(&self) {
        self.wake.notified().await;
    }

    /// Whether `id` is live or still waiting for its backing file to go.
    fn is_tracked(&self, id: &ObjectId) -> bool {
        let state = self.lock();
        state.schedule.contains(id) || state.removals.iter().any(|p| &p.id == id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().expect("store mutex poisoned")
    }
}

impl fmt::Debug for EphemeralStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("EphemeralStore")
            .field("directory", &self.config.directory)
            .field("active", &stats.active)
            .field("draining", &stats.draining)
            .finish()
    }
}
