#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative terrain state management for Strata.
//!
//! A [`Terrain`] owns a dense row-major grid of cells. Every mutation runs
//! through [`Terrain::set_tile_advanced`], which consults the outgoing and
//! incoming [`TileBehavior`] hooks, tears down and claims multi-tile
//! footprints atomically, and finally notifies the registered
//! [`ChangeListener`]s about the changed cell and, optionally, its eight
//! neighbours. The [`TileTypeTable`] is owned by the caller and passed into
//! every operation.
//!
//! The engine is single-threaded: mutations, hooks and notifications run
//! synchronously to completion or are rolled back in full.

mod behaviors;
mod grid;
mod listeners;
pub mod persist;
mod tiles;

use std::rc::Rc;

use strata_core::{
    Cell, CellCoord, Command, Event, PlacementRejection, TileId, WorldSize, MOORE_NEIGHBOURHOOD,
};
use thiserror::Error;
use tracing::{debug, warn};

pub use behaviors::{Plain, Protected, Structure};
pub use listeners::{ChangeListener, ListenerId};
pub use tiles::{RegistryError, TileBehavior, TileContext, TileTypeTable, TileTypeTableBuilder};

use grid::Grid;
use listeners::{notify, ListenerRegistry};

/// Errors raised when constructing a terrain.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum TerrainError {
    /// Either dimension is zero or the grid would exceed the largest world size.
    #[error("terrain dimensions {columns}x{rows} are not supported")]
    InvalidDimensions {
        /// Requested number of columns.
        columns: u32,
        /// Requested number of rows.
        rows: u32,
    },
    /// The fill tile is not registered in the tile type table.
    #[error("fill tile {} is not registered", .0.get())]
    UnknownTile(TileId),
}

/// Flags accepted by [`Terrain::set_tile_advanced`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetTileOptions {
    /// Skips the outgoing tile's replace check.
    pub ignore_replace_check: bool,
    /// Notifies the eight neighbours of the changed cell.
    pub update_neighbours: bool,
}

impl SetTileOptions {
    /// Options used by [`Terrain::set_tile`].
    pub const STANDARD: Self = Self {
        ignore_replace_check: false,
        update_neighbours: true,
    };

    /// Options used by [`Terrain::remove_tile`].
    pub const PRIVILEGED: Self = Self {
        ignore_replace_check: true,
        update_neighbours: true,
    };
}

/// Represents the authoritative terrain of one world session.
#[derive(Debug)]
pub struct Terrain {
    grid: Grid,
    listeners: ListenerRegistry,
}

impl Terrain {
    /// Creates a terrain of the given dimensions with every cell set to `fill`.
    ///
    /// No hooks run and no listeners exist yet.
    pub fn new(
        tiles: &TileTypeTable,
        columns: u32,
        rows: u32,
        fill: TileId,
    ) -> Result<Self, TerrainError> {
        let grid = filled_grid(tiles, columns, rows, fill)?;
        Ok(Self::from_grid(grid))
    }

    /// Creates a terrain sized by a world-size preset.
    pub fn with_size(
        tiles: &TileTypeTable,
        size: WorldSize,
        fill: TileId,
    ) -> Result<Self, TerrainError> {
        let (columns, rows) = size.dimensions();
        Self::new(tiles, columns, rows, fill)
    }

    pub(crate) fn from_grid(grid: Grid) -> Self {
        Self {
            grid,
            listeners: ListenerRegistry::default(),
        }
    }

    /// Reports whether the coordinate lies inside the grid.
    #[must_use]
    pub fn is_valid_position(&self, cell: CellCoord) -> bool {
        self.grid.is_valid_position(cell)
    }

    /// Borrows the cell at the coordinate, or `None` outside the grid.
    ///
    /// The borrow ends before the next mutation, so callers re-read after
    /// every change.
    #[must_use]
    pub fn get_cell(&self, cell: CellCoord) -> Option<&Cell> {
        self.grid.get(cell)
    }

    /// Tile occupying the cell, or `None` outside the grid.
    #[must_use]
    pub fn tile(&self, cell: CellCoord) -> Option<TileId> {
        self.get_cell(cell).map(Cell::tile)
    }

    /// Metadata stored in the cell, or `None` outside the grid.
    #[must_use]
    pub fn metadata(&self, cell: CellCoord) -> Option<u8> {
        self.get_cell(cell).map(Cell::metadata)
    }

    /// Overwrites the metadata of a cell and notifies listeners about that
    /// cell only.
    ///
    /// Returns `false` when the coordinate lies outside the grid or the cell
    /// belongs to a multi-tile structure, whose metadata is owned by the
    /// structure's behaviour.
    pub fn set_metadata(
        &mut self,
        tiles: &TileTypeTable,
        cell: CellCoord,
        metadata: u8,
    ) -> bool {
        if !self.grid.is_valid_position(cell) {
            return false;
        }
        let behavior = tiles.tile(self.grid.cell(cell).tile());
        if behavior.is_multi_tile(&TileContext::new(&mut self.grid, tiles), cell) {
            return false;
        }
        let slot = self.grid.cell_mut(cell);
        *slot = slot.with_metadata(metadata);
        notify(&self.listeners.snapshot(), cell);
        true
    }

    /// Writes a complete cell verbatim, bypassing every tile hook and the
    /// multi-tile protocol, and notifies listeners about that cell only.
    ///
    /// Meant for mirroring state that an authoritative terrain already
    /// committed. Returns `false` when the coordinate lies outside the grid
    /// or the tile is not registered.
    pub fn overwrite_cell(&mut self, tiles: &TileTypeTable, cell: CellCoord, value: Cell) -> bool {
        if !self.grid.is_valid_position(cell) || !tiles.contains(value.tile()) {
            return false;
        }
        *self.grid.cell_mut(cell) = value;
        notify(&self.listeners.snapshot(), cell);
        true
    }

    /// Places a tile, honouring the replace check of the current tile, and
    /// cascades to the neighbours.
    ///
    /// Returns `false` without mutating anything when the placement is
    /// rejected.
    pub fn set_tile(&mut self, tiles: &TileTypeTable, cell: CellCoord, tile: TileId) -> bool {
        self.set_tile_advanced(tiles, cell, tile, SetTileOptions::STANDARD)
            .is_ok()
    }

    /// Places a tile during world generation.
    ///
    /// The replace check is skipped; hooks, the multi-tile protocol and the
    /// cascade still run. Intended for initial authoring only.
    pub fn gen_set_tile(
        &mut self,
        tiles: &TileTypeTable,
        cell: CellCoord,
        tile: TileId,
        update_neighbours: bool,
    ) -> bool {
        let options = SetTileOptions {
            ignore_replace_check: true,
            update_neighbours,
        };
        self.set_tile_advanced(tiles, cell, tile, options).is_ok()
    }

    /// Removes the tile at `cell`, writing `replacement` in its place.
    ///
    /// Removal is privileged: the replace check is skipped and the neighbours
    /// are always notified. It can still fail when a multi-tile structure
    /// refuses teardown, in which case nothing changes.
    pub fn remove_tile(
        &mut self,
        tiles: &TileTypeTable,
        cell: CellCoord,
        replacement: TileId,
    ) -> bool {
        self.set_tile_advanced(tiles, cell, replacement, SetTileOptions::PRIVILEGED)
            .is_ok()
    }

    /// Runs the full mutation protocol for one cell.
    ///
    /// 1. Unless `ignore_replace_check` is set, the outgoing tile must accept
    ///    replacement.
    /// 2. A multi-tile structure occupying the cell is torn down as a whole.
    /// 3. `on_destroyed` runs on the outgoing tile.
    /// 4. The new tile is written tentatively and, for multi-tile structures,
    ///    its footprint is claimed.
    /// 5. `on_placed` runs and the invalidation cascade notifies listeners.
    ///
    /// A failure in steps 1, 2 or 4 restores every cell written so far and
    /// reports the reason. The outgoing tile's `on_placed` is not re-invoked
    /// during such a rollback.
    pub fn set_tile_advanced(
        &mut self,
        tiles: &TileTypeTable,
        cell: CellCoord,
        tile: TileId,
        options: SetTileOptions,
    ) -> Result<(), PlacementRejection> {
        let outcome = self.commit(tiles, cell, tile, options);
        if let Err(reason) = outcome {
            debug!(
                column = cell.column(),
                row = cell.row(),
                tile = tile.get(),
                ?reason,
                "tile mutation rejected"
            );
        }
        outcome
    }

    fn commit(
        &mut self,
        tiles: &TileTypeTable,
        cell: CellCoord,
        tile: TileId,
        options: SetTileOptions,
    ) -> Result<(), PlacementRejection> {
        if !self.grid.is_valid_position(cell) {
            return Err(PlacementRejection::OutOfBounds);
        }
        let Some(incoming) = tiles.get(tile) else {
            return Err(PlacementRejection::UnknownTile);
        };
        let outgoing = tiles.tile(self.grid.cell(cell).tile());

        let mut ctx = TileContext::new(&mut self.grid, tiles);
        if !options.ignore_replace_check && !outgoing.can_be_replaced(&ctx, cell) {
            return Err(PlacementRejection::Protected);
        }
        if outgoing.is_multi_tile(&ctx, cell) && !outgoing.kill_multi_tile(&mut ctx, cell) {
            ctx.rollback();
            warn!(
                column = cell.column(),
                row = cell.row(),
                "failed to destroy multi-tile structure"
            );
            return Err(PlacementRejection::TeardownFailed);
        }
        outgoing.on_destroyed(&mut ctx, cell);

        // Tentative until the footprint is confirmed.
        let written = ctx.set_cell(cell, Cell::new(tile, 0));
        debug_assert!(written, "validated cell rejected the new tile");
        if incoming.is_multi_tile(&ctx, cell) && !incoming.place_multi_tile(&mut ctx, cell) {
            ctx.rollback();
            return Err(PlacementRejection::FootprintBlocked);
        }
        incoming.on_placed(&mut ctx, cell);

        let touched = ctx.into_touched();
        self.cascade(tiles, cell, options.update_neighbours, touched);
        Ok(())
    }

    /// Notifies listeners that `cell` changed and, when `update_neighbours`
    /// is set, lets each in-bounds neighbour react before notifying for it.
    ///
    /// Coordinates outside the grid are ignored.
    pub fn update_cached_indices(
        &mut self,
        tiles: &TileTypeTable,
        cell: CellCoord,
        update_neighbours: bool,
    ) {
        if self.grid.is_valid_position(cell) {
            self.cascade(tiles, cell, update_neighbours, Vec::new());
        }
    }

    fn cascade(
        &mut self,
        tiles: &TileTypeTable,
        cell: CellCoord,
        update_neighbours: bool,
        mut follow_up: Vec<CellCoord>,
    ) {
        let listeners = self.listeners.snapshot();
        let mut notified = Vec::with_capacity(1 + MOORE_NEIGHBOURHOOD.len());
        notify(&listeners, cell);
        notified.push(cell);

        if update_neighbours {
            for neighbour in MOORE_NEIGHBOURHOOD {
                let Some(position) = cell.neighbour(neighbour) else {
                    continue;
                };
                if !self.grid.is_valid_position(position) {
                    continue;
                }
                let behavior = tiles.tile(self.grid.cell(position).tile());
                let mut ctx = TileContext::new(&mut self.grid, tiles);
                behavior.on_neighbour_change(&mut ctx, position);
                follow_up.extend(ctx.into_touched());
                notify(&listeners, position);
                notified.push(position);
            }
        }

        for position in follow_up {
            if !notified.contains(&position) {
                notify(&listeners, position);
                notified.push(position);
            }
        }
    }

    /// Notifies listeners about every cell once, in row-major order, without
    /// running any hooks.
    ///
    /// Used after bulk loads instead of per-cell cascades.
    pub fn recache_all(&self) {
        let listeners = self.listeners.snapshot();
        if listeners.is_empty() {
            return;
        }
        for position in self.grid.positions() {
            notify(&listeners, position);
        }
    }

    /// Registers a listener without taking ownership of it.
    ///
    /// Listeners are notified in registration order. A listener that is
    /// dropped without unregistering is skipped from then on.
    pub fn register_change_listener<L>(&mut self, listener: &Rc<L>) -> ListenerId
    where
        L: ChangeListener + 'static,
    {
        let weak = Rc::downgrade(listener);
        self.listeners.register(weak)
    }

    /// Unregisters a listener; unknown handles are ignored.
    pub fn unregister_change_listener(&mut self, id: ListenerId) {
        self.listeners.unregister(id);
    }
}

fn filled_grid(
    tiles: &TileTypeTable,
    columns: u32,
    rows: u32,
    fill: TileId,
) -> Result<Grid, TerrainError> {
    if !tiles.contains(fill) {
        return Err(TerrainError::UnknownTile(fill));
    }
    Grid::filled(columns, rows, Cell::new(fill, 0))
        .ok_or(TerrainError::InvalidDimensions { columns, rows })
}

/// Applies the provided command to the terrain, reporting the outcome as events.
pub fn apply(
    terrain: &mut Terrain,
    tiles: &TileTypeTable,
    command: Command,
    out_events: &mut Vec<Event>,
) {
    match command {
        Command::ConfigureTerrain {
            columns,
            rows,
            fill,
        } => match filled_grid(tiles, columns, rows, fill) {
            Ok(grid) => {
                terrain.grid = grid;
                terrain.recache_all();
                out_events.push(Event::TerrainConfigured { columns, rows });
            }
            Err(_) => out_events.push(Event::ConfigurationRejected {
                columns,
                rows,
                fill,
            }),
        },
        Command::SetTile { cell, tile } => {
            let event = match mutate(terrain, tiles, cell, tile, SetTileOptions::STANDARD) {
                Ok(previous) => Event::TilePlaced {
                    cell,
                    previous,
                    tile,
                },
                Err(reason) => Event::TileRejected { cell, tile, reason },
            };
            out_events.push(event);
        }
        Command::GenSetTile {
            cell,
            tile,
            update_neighbours,
        } => {
            let options = SetTileOptions {
                ignore_replace_check: true,
                update_neighbours,
            };
            let event = match mutate(terrain, tiles, cell, tile, options) {
                Ok(previous) => Event::TilePlaced {
                    cell,
                    previous,
                    tile,
                },
                Err(reason) => Event::TileRejected { cell, tile, reason },
            };
            out_events.push(event);
        }
        Command::RemoveTile { cell, replacement } => {
            let event = match mutate(terrain, tiles, cell, replacement, SetTileOptions::PRIVILEGED)
            {
                Ok(previous) => Event::TileRemoved {
                    cell,
                    previous,
                    replacement,
                },
                Err(reason) => Event::TileRejected {
                    cell,
                    tile: replacement,
                    reason,
                },
            };
            out_events.push(event);
        }
        Command::SetMetadata { cell, metadata } => {
            if terrain.set_metadata(tiles, cell, metadata) {
                out_events.push(Event::MetadataChanged { cell, metadata });
            }
        }
    }
}

/// Runs one mutation and returns the tile the cell held before it.
fn mutate(
    terrain: &mut Terrain,
    tiles: &TileTypeTable,
    cell: CellCoord,
    tile: TileId,
    options: SetTileOptions,
) -> Result<TileId, PlacementRejection> {
    let Some(previous) = terrain.tile(cell) else {
        debug!(
            column = cell.column(),
            row = cell.row(),
            "tile mutation outside the grid rejected"
        );
        return Err(PlacementRejection::OutOfBounds);
    };
    terrain.set_tile_advanced(tiles, cell, tile, options)?;
    Ok(previous)
}

/// Query functions that provide read-only access to the terrain state.
pub mod query {
    use std::collections::BTreeMap;

    use super::Terrain;
    use strata_core::{Cell, CellCoord, TileId};

    /// Column and row count of the terrain grid.
    #[must_use]
    pub fn dimensions(terrain: &Terrain) -> (u32, u32) {
        terrain.grid.dimensions()
    }

    /// Iterates every cell with its coordinate in row-major order.
    pub fn cells(terrain: &Terrain) -> impl Iterator<Item = (CellCoord, Cell)> + '_ {
        terrain
            .grid
            .positions()
            .zip(terrain.grid.cells().iter().copied())
    }

    /// Counts how many cells each tile occupies.
    #[must_use]
    pub fn tile_histogram(terrain: &Terrain) -> BTreeMap<TileId, u64> {
        let mut histogram = BTreeMap::new();
        for cell in terrain.grid.cells() {
            *histogram.entry(cell.tile()).or_insert(0) += 1;
        }
        histogram
    }

    /// Number of registered listeners that are still alive.
    #[must_use]
    pub fn listener_count(terrain: &Terrain) -> usize {
        terrain.listeners.live_count()
    }
}
