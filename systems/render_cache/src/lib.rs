#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Render cache invalidation for chunked terrain drawing.
//!
//! Renderers bake the terrain into fixed-size chunks. [`ChunkInvalidator`]
//! listens for cell changes, marks the owning chunk dirty and hands the dirty
//! chunks out in row-major order so every frame rebuilds them in the same
//! sequence.

use std::{cell::RefCell, collections::BTreeSet};

use strata_core::{CellCoord, CellRect, CellRectSize};
use strata_terrain::ChangeListener;

/// Chunk edge length used when none is configured.
pub const DEFAULT_CHUNK_SIDE: u32 = 32;

/// Location of a chunk measured in whole chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    column: u32,
    row: u32,
}

impl ChunkCoord {
    /// Creates a chunk coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based chunk column.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based chunk row.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }
}

/// Change listener that tracks which render chunks need rebuilding.
#[derive(Debug)]
pub struct ChunkInvalidator {
    chunk_size: CellRectSize,
    // Keyed by (row, column) so iteration is row-major.
    dirty: RefCell<BTreeSet<(u32, u32)>>,
}

impl Default for ChunkInvalidator {
    fn default() -> Self {
        Self::new(CellRectSize::new(DEFAULT_CHUNK_SIDE, DEFAULT_CHUNK_SIDE))
    }
}

impl ChunkInvalidator {
    /// Creates an invalidator for chunks of the provided size.
    ///
    /// A zero side is treated as one cell.
    #[must_use]
    pub fn new(chunk_size: CellRectSize) -> Self {
        Self {
            chunk_size: CellRectSize::new(chunk_size.width().max(1), chunk_size.height().max(1)),
            dirty: RefCell::new(BTreeSet::new()),
        }
    }

    /// Dimensions of one chunk in cells.
    #[must_use]
    pub const fn chunk_size(&self) -> CellRectSize {
        self.chunk_size
    }

    /// Chunk containing the cell.
    #[must_use]
    pub const fn chunk_of(&self, cell: CellCoord) -> ChunkCoord {
        ChunkCoord::new(
            cell.column() / self.chunk_size.width(),
            cell.row() / self.chunk_size.height(),
        )
    }

    /// Cells covered by the chunk, ignoring the terrain edge.
    #[must_use]
    pub fn chunk_bounds(&self, chunk: ChunkCoord) -> CellRect {
        let origin = CellCoord::new(
            chunk.column().saturating_mul(self.chunk_size.width()),
            chunk.row().saturating_mul(self.chunk_size.height()),
        );
        CellRect::from_origin_and_size(origin, self.chunk_size)
    }

    /// Number of chunks currently marked dirty.
    #[must_use]
    pub fn dirty_len(&self) -> usize {
        self.dirty.borrow().len()
    }

    /// Takes every dirty chunk in row-major order.
    #[must_use]
    pub fn drain(&self) -> Vec<ChunkCoord> {
        std::mem::take(&mut *self.dirty.borrow_mut())
            .into_iter()
            .map(|(row, column)| ChunkCoord::new(column, row))
            .collect()
    }
}

impl ChangeListener for ChunkInvalidator {
    fn on_tile_changed(&self, cell: CellCoord) {
        let chunk = self.chunk_of(cell);
        let _ = self.dirty.borrow_mut().insert((chunk.row(), chunk.column()));
    }
}
