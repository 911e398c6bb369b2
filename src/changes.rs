//! Per-tick change tracking and partial snapshots.
//!
//! The tracker records which particle indices changed during a tick, at most
//! once each, together with flag bits describing why. From that list it can
//! extract a compact partial snapshot of only the changed records, and apply
//! such a snapshot back into another buffer — the receiving side of a partial
//! update is index-addressed, so application order does not matter.

use crate::error::PartialUpdateError;
use crate::store::{Particle, ParticleBuffer};
use bitflags::bitflags;

bitflags! {
    /// Why a particle was marked changed this tick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChangeFlags: u8 {
        /// Depth advanced past the movement epsilon.
        const MOVED    = 1 << 0;
        /// Particle exited the view volume and was reseeded.
        const RECYCLED = 1 << 1;
        /// Record was rewritten by a config change or external merge.
        const REWRITTEN = 1 << 2;
    }
}

/// A compact snapshot of changed particle records.
///
/// `indices[i]` names the slot that `records[i]` belongs to; insertion order
/// is preserved from marking. The record vector is owned and moves across the
/// channel with the message that carries it.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialUpdate {
    pub indices: Vec<u32>,
    pub records: Vec<Particle>,
}

impl PartialUpdate {
    /// Number of records carried.
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Merge this update into `target`, record by record.
    ///
    /// Fails without touching `target` if the payload is malformed.
    pub fn apply(&self, target: &mut ParticleBuffer) -> Result<(), PartialUpdateError> {
        if self.indices.len() != self.records.len() {
            return Err(PartialUpdateError::LengthMismatch {
                indices: self.indices.len(),
                records: self.records.len(),
            });
        }
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= target.len()) {
            return Err(PartialUpdateError::IndexOutOfBounds {
                index: bad as usize,
                len: target.len(),
            });
        }
        for (&index, record) in self.indices.iter().zip(&self.records) {
            target[index as usize] = *record;
        }
        Ok(())
    }
}

/// Records the set of changed indices for one tick.
///
/// Duplicate marking is guarded by an explicit bitset (one bit per particle),
/// cleared wholesale at the start of each tick rather than lazily.
#[derive(Debug)]
pub struct ChangeTracker {
    changed: Vec<u32>,
    flags: Vec<ChangeFlags>,
    marked: Vec<u64>,
}

impl ChangeTracker {
    /// Create a tracker for `count` particles.
    pub fn new(count: usize) -> Self {
        Self {
            changed: Vec::with_capacity(count),
            flags: vec![ChangeFlags::empty(); count],
            marked: vec![0; count.div_ceil(64)],
        }
    }

    /// Resize for a new particle count, dropping all current marks.
    pub fn resize(&mut self, count: usize) {
        self.changed.clear();
        self.flags.clear();
        self.flags.resize(count, ChangeFlags::empty());
        self.marked.clear();
        self.marked.resize(count.div_ceil(64), 0);
    }

    /// Clear all marks. Must run before simulation, not after.
    pub fn reset(&mut self) {
        for f in &mut self.flags[..] {
            *f = ChangeFlags::empty();
        }
        self.marked.fill(0);
        self.changed.clear();
    }

    /// Mark `index` changed, appending it at most once per tick and OR-ing
    /// in the given flags.
    pub fn mark_changed(&mut self, index: usize, flags: ChangeFlags) {
        let (word, bit) = (index / 64, 1u64 << (index % 64));
        if self.marked[word] & bit == 0 {
            self.marked[word] |= bit;
            self.changed.push(index as u32);
        }
        self.flags[index] |= flags;
    }

    /// Changed indices in insertion order.
    #[inline]
    pub fn changed(&self) -> &[u32] {
        &self.changed
    }

    /// Number of changed indices this tick.
    #[inline]
    pub fn changed_count(&self) -> usize {
        self.changed.len()
    }

    /// Flags for one particle.
    #[inline]
    pub fn flags(&self, index: usize) -> ChangeFlags {
        self.flags[index]
    }

    /// Copy the changed records out of `store` into a compact snapshot,
    /// preserving insertion order.
    pub fn extract_partial(&self, store: &ParticleBuffer) -> PartialUpdate {
        let records = self
            .changed
            .iter()
            .map(|&i| store[i as usize])
            .collect();
        PartialUpdate {
            indices: self.changed.clone(),
            records,
        }
    }

    /// Whether a partial update is preferable to a full transfer, given the
    /// configured threshold fraction.
    pub fn prefers_partial(&self, star_count: usize, threshold: f32) -> bool {
        (self.changed.len() as f32) < threshold * star_count as f32
    }

    /// Release backing memory for cleanup.
    pub fn release(&mut self) {
        self.changed = Vec::new();
        self.flags = Vec::new();
        self.marked = Vec::new();
    }
}
