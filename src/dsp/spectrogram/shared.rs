//! Hand-off of the rolling matrix from the ingest thread to readers.
//!
//! The engine owns its working matrix and copies it into a shared snapshot
//! after producing columns. The ingest side only ever uses `try_write`, so a
//! reader holding the snapshot delays publication instead of blocking audio.

use super::history::RollingMatrix;
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Immutable view of the spectrogram as last published by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrogramSnapshot {
    /// Column-major magnitudes, oldest column first, row 0 = lowest frequency.
    pub values: Vec<f32>,
    pub freqs_per_column: usize,
    pub num_columns: usize,
    pub max_shown_frequency: f32,
    pub step_length_sec: f32,
    pub chart_length_sec: f32,
    pub last_update: u64,
    pub generation: u64,
}

impl SpectrogramSnapshot {
    pub fn column(&self, index: usize) -> Option<&[f32]> {
        if index >= self.num_columns {
            return None;
        }
        let start = index * self.freqs_per_column;
        self.values.get(start..start + self.freqs_per_column)
    }

    pub fn value(&self, column: usize, row: usize) -> Option<f32> {
        self.column(column)?.get(row).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything but the matrix contents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SnapshotMeta {
    pub freqs_per_column: usize,
    pub num_columns: usize,
    pub max_shown_frequency: f32,
    pub step_length_sec: f32,
    pub chart_length_sec: f32,
    pub last_update: u64,
    pub generation: u64,
}

impl SnapshotMeta {
    fn write_into(self, snapshot: &mut SpectrogramSnapshot, matrix: &RollingMatrix) {
        matrix.copy_ordered_into(&mut snapshot.values);
        snapshot.freqs_per_column = self.freqs_per_column;
        snapshot.num_columns = self.num_columns;
        snapshot.max_shown_frequency = self.max_shown_frequency;
        snapshot.step_length_sec = self.step_length_sec;
        snapshot.chart_length_sec = self.chart_length_sec;
        snapshot.last_update = self.last_update;
        snapshot.generation = self.generation;
    }
}

#[derive(Debug, Default)]
struct Shared {
    snapshot: RwLock<SpectrogramSnapshot>,
    last_update: AtomicU64,
    generation: AtomicU64,
}

impl Shared {
    fn announce(&self, meta: SnapshotMeta) {
        self.generation.store(meta.generation, Ordering::Release);
        self.last_update.store(meta.last_update, Ordering::Release);
    }
}

/// Producer half, owned by the engine.
#[derive(Debug, Default)]
pub(crate) struct Publisher {
    shared: Arc<Shared>,
    pending: bool,
}

impl Publisher {
    pub fn reader(&self) -> SpectrogramReader {
        SpectrogramReader {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Publishes unless a reader currently holds the snapshot, in which case
    /// the publication stays pending. Never blocks.
    pub fn try_publish(&mut self, matrix: &RollingMatrix, meta: SnapshotMeta) -> bool {
        let Some(mut snapshot) = self.shared.snapshot.try_write() else {
            self.pending = true;
            return false;
        };
        meta.write_into(&mut snapshot, matrix);
        drop(snapshot);
        self.shared.announce(meta);
        self.pending = false;
        true
    }

    /// Blocking publication for non-real-time paths (reconfiguration, reset).
    pub fn publish(&mut self, matrix: &RollingMatrix, meta: SnapshotMeta) {
        let mut snapshot = self.shared.snapshot.write();
        meta.write_into(&mut snapshot, matrix);
        drop(snapshot);
        self.shared.announce(meta);
        self.pending = false;
    }
}

/// Versions a reader has already consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeenState {
    pub last_update: u64,
    pub generation: u64,
}

/// Consumer half: cheap to clone and safe to hand to a render thread.
#[derive(Debug, Clone)]
pub struct SpectrogramReader {
    shared: Arc<Shared>,
}

impl SpectrogramReader {
    pub fn last_update(&self) -> u64 {
        self.shared.last_update.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> RwLockReadGuard<'_, SpectrogramSnapshot> {
        self.shared.snapshot.read()
    }

    /// Returns the snapshot only if it moved on since `seen`, and records
    /// the versions handed out.
    pub fn poll(&self, seen: &mut SeenState) -> Option<RwLockReadGuard<'_, SpectrogramSnapshot>> {
        let current = SeenState {
            last_update: self.last_update(),
            generation: self.generation(),
        };
        if current == *seen {
            return None;
        }

        let snapshot = self.shared.snapshot.read();
        *seen = SeenState {
            last_update: snapshot.last_update,
            generation: snapshot.generation,
        };
        Some(snapshot)
    }
}
