//! The mutable memtable and the immutable-memtable queue
//!
//! Exactly one mutable memtable exists at all times. It becomes immutable
//! when its size crosses `memtable_flush_size_mb`, at which point a fresh
//! mutable memtable replaces it and the frozen one is appended to the
//! immutable queue to await flush.

use lsmsim_core::{MemtableId, VirtualTime};

/// The currently-writable in-memory buffer
#[derive(Debug, Clone)]
pub struct Memtable {
    /// Current size, MB
    pub size_mb: f64,
    /// Virtual time this memtable was created
    pub created_at: VirtualTime,
}

impl Memtable {
    /// Creates a fresh, empty memtable
    pub fn new(now: VirtualTime) -> Self {
        Self {
            size_mb: 0.0,
            created_at: now,
        }
    }
}

/// A frozen memtable awaiting flush
#[derive(Debug, Clone)]
pub struct ImmutableMemtable {
    /// Stable id assigned when the memtable was frozen
    pub id: MemtableId,
    /// Size at the moment it was frozen, MB
    pub size_mb: f64,
    /// Virtual time the memtable was originally created
    pub created_at: VirtualTime,
    /// Virtual time it was frozen (became immutable)
    pub frozen_at: VirtualTime,
}
