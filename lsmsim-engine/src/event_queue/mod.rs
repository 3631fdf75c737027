//! The virtual-time event queue
//!
//! A min-heap over [`Event`]s keyed by `(timestamp, insertion_sequence)`:
//! events with equal timestamps are processed FIFO by the order they were
//! pushed, never in an order that depends on heap internals.
//!
//! There is no removal-by-id. A handler that needs to invalidate an earlier
//! event (for example, a memtable flush that was superseded) sets a flag on
//! the associated entity and the event is a no-op when it eventually fires.

use crate::compaction::CompactionJob;
use lsmsim_core::{MemtableId, VirtualTime};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A scheduled occurrence in the simulation
#[derive(Debug, Clone)]
pub enum Event {
    /// A write of `size_mb` arrives
    Write {
        /// Size of the write batch
        size_mb: f64,
        /// `true` if the traffic generator produced this write and should
        /// be asked for the next one once this is dispatched; `false` for
        /// writes injected via `schedule_write` (test harnesses), which do
        /// not continue a stream
        from_generator: bool,
    },
    /// An immutable memtable is flushed to an L0 file
    Flush {
        /// Size of the memtable being flushed
        size_mb: f64,
        /// Identifies which immutable memtable this flush targets
        memtable_id: MemtableId,
        /// When the flush was scheduled
        start_time: VirtualTime,
    },
    /// A compaction job's reserved disk window begins
    CompactionStart {
        /// The job being started
        job: CompactionJob,
    },
    /// A compaction job's reserved disk window ends
    CompactionComplete {
        /// The job that finished
        job: CompactionJob,
    },
    /// Periodic tick that runs the compaction scheduler even when traffic
    /// is paused
    CompactionCheck,
    /// Periodic tick that produces aggregate read-path metrics
    ReadSample,
}

struct QueueEntry {
    timestamp: OrderedFloat<f64>,
    seq: u64,
    event: Event,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.seq == other.seq
    }
}
impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest timestamp (and,
        // on ties, the earliest insertion) pops first.
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap priority queue over [`Event`]s, ordered by virtual timestamp
/// with FIFO tie-breaking
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<QueueEntry>,
    next_seq: u64,
}

impl EventQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedules `event` at `timestamp`
    ///
    /// # Panics
    ///
    /// Panics if `timestamp` is NaN; this would break the heap's ordering
    /// invariant and should never happen given the engine's inputs.
    pub fn push(&mut self, timestamp: VirtualTime, event: Event) {
        assert!(!timestamp.is_nan(), "event timestamp must not be NaN");
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueueEntry {
            timestamp: OrderedFloat(timestamp),
            seq,
            event,
        });
    }

    /// Removes and returns the earliest `(timestamp, event)` pair
    pub fn pop(&mut self) -> Option<(VirtualTime, Event)> {
        self.heap.pop().map(|e| (e.timestamp.into_inner(), e.event))
    }

    /// Returns the timestamp of the earliest scheduled event, without
    /// removing it
    pub fn peek_timestamp(&self) -> Option<VirtualTime> {
        self.heap.peek().map(|e| e.timestamp.into_inner())
    }

    /// Number of events currently queued
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// `true` if no events are queued
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Discards all queued events and resets the insertion-sequence counter
    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_timestamp_order() {
        let mut q = EventQueue::new();
        q.push(5.0, Event::CompactionCheck);
        q.push(1.0, Event::Write { size_mb: 1.0, from_generator: false });
        q.push(3.0, Event::ReadSample);

        assert_eq!(q.pop().unwrap().0, 1.0);
        assert_eq!(q.pop().unwrap().0, 3.0);
        assert_eq!(q.pop().unwrap().0, 5.0);
        assert!(q.pop().is_none());
    }

    #[test]
    fn ties_break_fifo_by_insertion() {
        let mut q = EventQueue::new();
        q.push(1.0, Event::Write { size_mb: 1.0, from_generator: false });
        q.push(1.0, Event::Write { size_mb: 2.0, from_generator: false });
        q.push(1.0, Event::Write { size_mb: 3.0, from_generator: false });

        let sizes: Vec<f64> = (0..3)
            .map(|_| match q.pop().unwrap().1 {
                Event::Write { size_mb, .. } => size_mb,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(sizes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn len_and_is_empty_track_contents() {
        let mut q = EventQueue::new();
        assert!(q.is_empty());
        q.push(0.0, Event::CompactionCheck);
        assert_eq!(q.len(), 1);
        assert!(!q.is_empty());
        q.clear();
        assert!(q.is_empty());
    }
}
