//! Circular snapshot buffer
//!
//! Fixed-capacity ring holding the most recent telemetry snapshots.
//! Insertion is O(1) and silently overwrites the oldest entry once the
//! buffer has wrapped; insertion order is the only retrievable order.

use crate::models::TelemetrySnapshot;

/// Ring buffer over the last N telemetry snapshots
#[derive(Debug)]
pub struct SnapshotRing {
    slots: Vec<TelemetrySnapshot>,
    capacity: usize,
    write_pos: usize,
    full: bool,
}

impl SnapshotRing {
    /// Create a ring with the given capacity (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            write_pos: 0,
            full: false,
        }
    }

    /// Store a snapshot at the write position and advance it modulo capacity
    pub fn push(&mut self, snapshot: TelemetrySnapshot) {
        if self.slots.len() < self.capacity {
            self.slots.push(snapshot);
        } else {
            self.slots[self.write_pos] = snapshot;
        }

        self.write_pos = (self.write_pos + 1) % self.capacity;
        if self.write_pos == 0 {
            self.full = true;
        }
    }

    /// Number of valid entries
    pub fn len(&self) -> usize {
        if self.full {
            self.capacity
        } else {
            self.write_pos
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the ring has wrapped at least once
    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently inserted snapshot
    pub fn latest(&self) -> Option<&TelemetrySnapshot> {
        if self.is_empty() {
            return None;
        }
        let pos = (self.write_pos + self.capacity - 1) % self.capacity;
        self.slots.get(pos)
    }

    /// Second most recently inserted snapshot
    pub fn previous(&self) -> Option<&TelemetrySnapshot> {
        if self.len() < 2 {
            return None;
        }
        let pos = (self.write_pos + self.capacity - 2) % self.capacity;
        self.slots.get(pos)
    }

    /// Current contents in insertion order (oldest first)
    pub fn snapshots(&self) -> Vec<TelemetrySnapshot> {
        let len = self.len();
        let mut result = Vec::with_capacity(len);
        for i in 0..len {
            let pos = (self.write_pos + self.capacity - len + i) % self.capacity;
            result.push(self.slots[pos].clone());
        }
        result
    }
}
