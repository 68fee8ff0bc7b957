//! Live-object index and expiry min-heap.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ephemera_types::{DisplayName, ObjectId};
use serde::Serialize;

/// Metadata for an active object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ObjectMeta {
    pub id: ObjectId,
    pub name: DisplayName,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Reader-count token for one object.
///
/// Every open reader holds a clone; the backing file is only unlinked once
/// the store's copy is the last one left.
#[derive(Clone, Debug, Default)]
pub struct ReadLease(Arc<()>);

impl ReadLease {
    /// Returns `true` when no reader holds a clone.
    pub fn is_idle(&self) -> bool {
        Arc::strong_count(&self.0) == 1
    }
}

/// An indexed object together with its lease.
#[derive(Clone, Debug)]
pub struct ScheduledObject {
    pub meta: ObjectMeta,
    pub lease: ReadLease,
}

/// Index of active objects plus a min-heap of their deadlines.
///
/// Cancelled objects leave their heap entry behind; stale entries are
/// skipped when they surface and the heap is rebuilt once they outnumber the
/// live ones. Not synchronized; the store wraps it in a mutex.
#[derive(Debug, Default)]
pub struct ExpirySchedule {
    index: HashMap<ObjectId, ScheduledObject>,
    heap: BinaryHeap<Reverse<(DateTime<Utc>, ObjectId)>>,
}

impl ExpirySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active objects.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.index.contains_key(id)
    }

    /// Track a new object. Returns `false` (and changes nothing) if the id is
    /// already present.
    pub fn insert(&mut self, meta: ObjectMeta) -> bool {
        if self.index.contains_key(&meta.id) {
            return false;
        }
        self.heap.push(Reverse((meta.expires_at, meta.id.clone())));
        self.index.insert(
            meta.id.clone(),
            ScheduledObject {
                meta,
                lease: ReadLease::default(),
            },
        );
        true
    }

    /// Look up an object that is still active at `now`, handing out a fresh
    /// lease clone for the caller to hold while reading.
    pub fn lookup_active(&self, id: &ObjectId, now: DateTime<Utc>) -> Option<(ObjectMeta, ReadLease)> {
        self.index
            .get(id)
            .filter(|obj| now < obj.meta.expires_at)
            .map(|obj| (obj.meta.clone(), obj.lease.clone()))
    }

    /// Stop tracking an object ahead of its deadline.
    pub fn cancel(&mut self, id: &ObjectId) -> Option<ScheduledObject> {
        let removed = self.index.remove(id);
        if removed.is_some() && self.heap.len() > 2 * self.index.len() + 16 {
            self.compact();
        }
        removed
    }

    /// Remove and return every object whose deadline is at or before `now`,
    /// earliest first.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<ScheduledObject> {
        let mut due = Vec::new();
        while let Some(Reverse((deadline, _))) = self.heap.peek() {
            if *deadline > now {
                break;
            }
            let Some(Reverse((deadline, id))) = self.heap.pop() else {
                break;
            };
            if self.is_live(&id, deadline) {
                if let Some(obj) = self.index.remove(&id) {
                    due.push(obj);
                }
            }
        }
        due
    }

    /// Earliest live deadline. Prunes stale heap heads on the way.
    pub fn next_deadline(&mut self) -> Option<DateTime<Utc>> {
        while let Some(Reverse((deadline, id))) = self.heap.peek() {
            if self.is_live(id, *deadline) {
                return Some(*deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Snapshot of every active object, earliest deadline first.
    pub fn pending(&self) -> Vec<ObjectMeta> {
        let mut metas: Vec<ObjectMeta> = self.index.values().map(|obj| obj.meta.clone()).collect();
        metas.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then_with(|| a.id.cmp(&b.id)));
        metas
    }

    /// Heap entries, stale ones included.
    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    fn is_live(&self, id: &ObjectId, deadline: DateTime<Utc>) -> bool {
        self.index
            .get(id)
            .is_some_and(|obj| obj.meta.expires_at == deadline)
    }

    fn compact(&mut self) {
        self.heap = self
            .index
            .values()
            .map(|obj| Reverse((obj.meta.expires_at, obj.meta.id.clone())))
            .collect();
    }
}
