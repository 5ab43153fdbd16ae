// src/core/clock.rs

//! Vector-clock versioning for values stored in the cluster. A `VectorClock`
//! is a partial order over per-writer counters; comparing two clocks tells
//! the caller whether one write happens-before another, or whether the two
//! are concurrent siblings.

use crate::core::errors::RingError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single `(nodeId, counter)` entry in a vector clock.
pub type NodeId = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ClockEntry {
    node_id: NodeId,
    counter: u64,
}

/// The result of comparing two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    Before,
    After,
    Concurrently,
    Equal,
}

/// An ordered list of `(nodeId, counter)` entries plus the wall-clock
/// timestamp of the last mutation. Entries are kept sorted by `nodeId` and
/// each `nodeId` appears at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorClock {
    entries: Vec<ClockEntry>,
    timestamp_ms: u64,
}

impl Default for VectorClock {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorClock {
    /// Creates an empty clock stamped with the current wall-clock time.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            timestamp_ms: now_ms(),
        }
    }

    /// The wall-clock timestamp (milliseconds since epoch) of the last mutation.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Creates-or-bumps the counter for `node_id` and refreshes the timestamp.
    /// Returns a new clock; the receiver is left unchanged.
    pub fn increment(&self, node_id: NodeId) -> Self {
        let mut entries = self.entries.clone();
        match entries.binary_search_by_key(&node_id, |e| e.node_id) {
            Ok(idx) => entries[idx].counter += 1,
            Err(idx) => entries.insert(
                idx,
                ClockEntry {
                    node_id,
                    counter: 1,
                },
            ),
        }
        Self {
            entries,
            timestamp_ms: now_ms(),
        }
    }

    /// Compares this clock against `other`.
    ///
    /// `self` is BEFORE `other` iff every counter in `self` is <= the
    /// corresponding counter in `other`, and at least one is strictly less.
    /// Symmetric for AFTER. Any other relationship is CONCURRENTLY, unless
    /// every counter matches exactly (EQUAL).
    pub fn compare(&self, other: &Self) -> Ordering {
        let mut self_less = false;
        let mut other_less = false;

        let mut i = 0;
        let mut j = 0;
        while i < self.entries.len() || j < other.entries.len() {
            let (self_entry, other_entry) = (self.entries.get(i), other.entries.get(j));
            match (self_entry, other_entry) {
                (Some(a), Some(b)) if a.node_id == b.node_id => {
                    if a.counter < b.counter {
                        self_less = true;
                    } else if a.counter > b.counter {
                        other_less = true;
                    }
                    i += 1;
                    j += 1;
                }
                (Some(a), Some(b)) if a.node_id < b.node_id => {
                    // self has an entry other lacks (implicitly 0 on other's side).
                    other_less = true;
                    i += 1;
                }
                (Some(_), Some(_)) => {
                    // other has an entry self lacks.
                    self_less = true;
                    j += 1;
                }
                (Some(_), None) => {
                    other_less = true;
                    i += 1;
                }
                (None, Some(_)) => {
                    self_less = true;
                    j += 1;
                }
                (None, None) => unreachable!(),
            }
        }

        match (self_less, other_less) {
            (false, false) => Ordering::Equal,
            (true, false) => Ordering::Before,
            (false, true) => Ordering::After,
            (true, true) => Ordering::Concurrently,
        }
    }

    /// Per-nodeId max of the two clocks; timestamp is the max of the two.
    pub fn merge(&self, other: &Self) -> Self {
        let mut entries = Vec::with_capacity(self.entries.len() + other.entries.len());
        let mut i = 0;
        let mut j = 0;
        while i < self.entries.len() || j < other.entries.len() {
            match (self.entries.get(i), other.entries.get(j)) {
                (Some(a), Some(b)) if a.node_id == b.node_id => {
                    entries.push(ClockEntry {
                        node_id: a.node_id,
                        counter: a.counter.max(b.counter),
                    });
                    i += 1;
                    j += 1;
                }
                (Some(a), Some(b)) if a.node_id < b.node_id => {
                    entries.push(*a);
                    i += 1;
                }
                (Some(_), Some(b)) => {
                    entries.push(*b);
                    j += 1;
                }
                (Some(a), None) => {
                    entries.push(*a);
                    i += 1;
                }
                (None, Some(b)) => {
                    entries.push(*b);
                    j += 1;
                }
                (None, None) => unreachable!(),
            }
        }
        Self {
            entries,
            timestamp_ms: self.timestamp_ms.max(other.timestamp_ms),
        }
    }

    /// Serializes as `u16 entryCount`, `entryCount * (u16 nodeId, u64 counter)`, `u64 timestamp`.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.byte_len());
        buf.put_u16(self.entries.len() as u16);
        for entry in &self.entries {
            buf.put_u16(entry.node_id);
            buf.put_u64(entry.counter);
        }
        buf.put_u64(self.timestamp_ms);
        buf.freeze()
    }

    /// The exact wire size for this clock: `2 + entryCount*10 + 8` bytes.
    pub fn byte_len(&self) -> usize {
        2 + self.entries.len() * 10 + 8
    }

    /// Parses a clock from its wire format, failing on truncation or
    /// unsorted/duplicate node IDs.
    pub fn from_bytes(mut src: impl Buf) -> Result<Self, RingError> {
        if src.remaining() < 2 {
            return Err(RingError::InvalidClockFormat(
                "truncated entry count".into(),
            ));
        }
        let count = src.get_u16() as usize;

        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            if src.remaining() < 10 {
                return Err(RingError::InvalidClockFormat("truncated entry".into()));
            }
            let node_id = src.get_u16();
            let counter = src.get_u64();
            if let Some(last) = entries.last() {
                let last_entry: &ClockEntry = last;
                if node_id <= last_entry.node_id {
                    return Err(RingError::InvalidClockFormat(
                        "entries not strictly sorted by nodeId".into(),
                    ));
                }
            }
            entries.push(ClockEntry { node_id, counter });
        }

        if src.remaining() < 8 {
            return Err(RingError::InvalidClockFormat("truncated timestamp".into()));
        }
        let timestamp_ms = src.get_u64();

        Ok(Self {
            entries,
            timestamp_ms,
        })
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A value paired with the vector clock that versions it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<V> {
    pub value: V,
    pub version: VectorClock,
}

impl<V> Versioned<V> {
    pub fn new(value: V, version: VectorClock) -> Self {
        Self { value, version }
    }

    /// Two versions are siblings iff their clocks compare CONCURRENTLY.
    pub fn is_sibling_of<W>(&self, other: &Versioned<W>) -> bool {
        self.version.compare(&other.version) == Ordering::Concurrently
    }
}
