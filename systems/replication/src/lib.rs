#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Replication system that mirrors committed terrain changes to remote peers.
//!
//! A [`DeltaQueue`] is registered as a change listener on the authoritative
//! terrain. It records every changed coordinate once, in arrival order, and
//! [`DeltaQueue::drain`] later reads the committed state of those cells into
//! [`DeltaBatch`] values ready for encoding. Receivers decode the batches and
//! apply them with [`apply_batch`], which writes cells verbatim because the
//! authoritative side already ran every tile hook.

use std::{cell::RefCell, collections::HashSet};

use serde::{Deserialize, Serialize};
use strata_core::{Cell, CellCoord, TileId};
use strata_terrain::{query, ChangeListener, Terrain, TileTypeTable};
use thiserror::Error;
use tracing::debug;

/// Delivery guarantee requested for a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SendStrategy {
    /// Delivered in order and retransmitted until acknowledged.
    #[default]
    Reliable,
    /// Delivered at most once; lost batches are superseded by later ones.
    Unreliable,
}

/// Committed state of one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellDelta {
    /// Position of the cell.
    pub cell: CellCoord,
    /// Tile occupying the cell.
    pub tile: TileId,
    /// Metadata stored in the cell.
    pub metadata: u8,
}

impl CellDelta {
    /// Captures the provided cell value at `cell`.
    #[must_use]
    pub const fn new(cell: CellCoord, value: Cell) -> Self {
        Self {
            cell,
            tile: value.tile(),
            metadata: value.metadata(),
        }
    }

    /// Cell value carried by the delta.
    #[must_use]
    pub const fn value(&self) -> Cell {
        Cell::new(self.tile, self.metadata)
    }
}

/// Distinguishes incremental updates from full snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchKind {
    /// Carries only the cells that changed since the previous drain.
    Incremental,
    /// Carries every cell of a terrain with the provided dimensions.
    Resync {
        /// Column count of the authoritative terrain.
        columns: u32,
        /// Row count of the authoritative terrain.
        rows: u32,
    },
}

/// Group of deltas sent together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaBatch {
    /// Delivery guarantee requested for the batch.
    pub strategy: SendStrategy,
    /// Whether the batch is incremental or a full snapshot.
    pub kind: BatchKind,
    /// Cell states in the order they were observed.
    pub deltas: Vec<CellDelta>,
}

/// Tuning knobs for [`DeltaQueue::drain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Largest number of deltas carried by one incremental batch.
    pub max_batch_len: usize,
    /// Pending coordinate count above which a full resync is sent instead.
    pub resync_threshold: usize,
    /// Strategy used for incremental batches. Resyncs are always reliable.
    pub incremental_strategy: SendStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_batch_len: 256,
            resync_threshold: 4096,
            incremental_strategy: SendStrategy::Reliable,
        }
    }
}

/// Errors raised while encoding or applying batches.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// The batch could not be encoded or decoded.
    #[error("replication batch is unreadable: {0}")]
    Encoding(#[from] bincode::Error),
    /// A resync batch describes a terrain of different dimensions.
    #[error("resync for a {columns}x{rows} terrain does not match the local terrain")]
    DimensionMismatch {
        /// Column count announced by the batch.
        columns: u32,
        /// Row count announced by the batch.
        rows: u32,
    },
    /// A delta targets a cell outside the grid or an unregistered tile.
    #[error("delta for ({}, {}) was rejected", .0.column(), .0.row())]
    Rejected(CellCoord),
}

/// Change listener that accumulates coordinates awaiting replication.
#[derive(Debug, Default)]
pub struct DeltaQueue {
    pending: RefCell<Vec<CellCoord>>,
    queued: RefCell<HashSet<CellCoord>>,
}

impl ChangeListener for DeltaQueue {
    fn on_tile_changed(&self, cell: CellCoord) {
        if self.queued.borrow_mut().insert(cell) {
            self.pending.borrow_mut().push(cell);
        }
    }
}

impl DeltaQueue {
    /// Number of distinct coordinates awaiting replication.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Reads the committed state of every pending cell into batches and
    /// empties the queue.
    ///
    /// When more coordinates are pending than `config.resync_threshold`, a
    /// single reliable resync batch carrying the whole terrain is produced.
    /// Coordinates that no longer lie inside the terrain are dropped.
    #[must_use]
    pub fn drain(&self, terrain: &Terrain, config: &Config) -> Vec<DeltaBatch> {
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        self.queued.borrow_mut().clear();
        if pending.is_empty() {
            return Vec::new();
        }

        if pending.len() > config.resync_threshold {
            let (columns, rows) = query::dimensions(terrain);
            debug!(pending = pending.len(), columns, rows, "sending terrain resync");
            let deltas = query::cells(terrain)
                .map(|(cell, value)| CellDelta::new(cell, value))
                .collect();
            return vec![DeltaBatch {
                strategy: SendStrategy::Reliable,
                kind: BatchKind::Resync { columns, rows },
                deltas,
            }];
        }

        let deltas: Vec<CellDelta> = pending
            .into_iter()
            .filter_map(|cell| {
                terrain
                    .get_cell(cell)
                    .map(|value| CellDelta::new(cell, *value))
            })
            .collect();
        deltas
            .chunks(config.max_batch_len.max(1))
            .map(|chunk| DeltaBatch {
                strategy: config.incremental_strategy,
                kind: BatchKind::Incremental,
                deltas: chunk.to_vec(),
            })
            .collect()
    }
}

/// Serialises a batch for transport.
pub fn encode_batch(batch: &DeltaBatch) -> Result<Vec<u8>, ReplicationError> {
    Ok(bincode::serialize(batch)?)
}

/// Deserialises a batch received from transport.
pub fn decode_batch(bytes: &[u8]) -> Result<DeltaBatch, ReplicationError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Applies a received batch, returning how many cells actually changed.
///
/// Resync batches must match the local dimensions.
pub fn apply_batch(
    terrain: &mut Terrain,
    tiles: &TileTypeTable,
    batch: &DeltaBatch,
) -> Result<usize, ReplicationError> {
    if let BatchKind::Resync { columns, rows } = batch.kind {
        if query::dimensions(terrain) != (columns, rows) {
            return Err(ReplicationError::DimensionMismatch { columns, rows });
        }
    }
    apply_deltas(terrain, tiles, &batch.deltas)
}

/// Writes every delta that differs from the local cell, returning how many
/// cells changed.
///
/// Deltas are applied in order; the first rejected delta stops the pass and
/// leaves the earlier ones committed.
pub fn apply_deltas(
    terrain: &mut Terrain,
    tiles: &TileTypeTable,
    deltas: &[CellDelta],
) -> Result<usize, ReplicationError> {
    let mut changed = 0;
    for delta in deltas {
        let value = delta.value();
        if terrain.get_cell(delta.cell) == Some(&value) {
            continue;
        }
        if !terrain.overwrite_cell(tiles, delta.cell, value) {
            return Err(ReplicationError::Rejected(delta.cell));
        }
        changed += 1;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_deduplicates_in_arrival_order() {
        let queue = DeltaQueue::default();
        for (column, row) in [(2, 2), (1, 1), (2, 2), (0, 3), (1, 1)] {
            queue.on_tile_changed(CellCoord::new(column, row));
        }

        assert_eq!(queue.pending_len(), 3);
        assert_eq!(
            queue.pending.borrow().as_slice(),
            &[
                CellCoord::new(2, 2),
                CellCoord::new(1, 1),
                CellCoord::new(0, 3)
            ]
        );
    }

    #[test]
    fn delta_value_round_trips_cell() {
        let value = Cell::new(TileId::new(5), 0x21);
        let delta = CellDelta::new(CellCoord::new(3, 4), value);

        assert_eq!(delta.value(), value);
    }
}
