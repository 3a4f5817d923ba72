//! Tile type table, the behaviour hooks it resolves to, and the context those
//! hooks operate on.

use std::{collections::HashMap, fmt};

use strata_core::{Cell, CellCoord, TileId};
use thiserror::Error;

use crate::grid::Grid;

/// Hooks invoked by the terrain controller for one tile type.
///
/// Behaviours are registered once by the content system and shared read-only
/// by every grid operation. A `false` return means "not permitted" and is
/// never treated as a fatal error. Every method has a default that describes
/// an ordinary single-cell tile which may always be replaced.
pub trait TileBehavior {
    /// Reports whether the tile occupying `cell` may be replaced by a
    /// standard placement.
    fn can_be_replaced(&self, _ctx: &TileContext<'_>, _cell: CellCoord) -> bool {
        true
    }

    /// Reports whether the tile occupying `cell` is part of a structure that
    /// spans several cells.
    fn is_multi_tile(&self, _ctx: &TileContext<'_>, _cell: CellCoord) -> bool {
        false
    }

    /// Validates and claims every footprint cell of a structure whose tile
    /// was just written to `cell`.
    ///
    /// Writes made through the context are rolled back by the controller when
    /// this returns `false`.
    fn place_multi_tile(&self, _ctx: &mut TileContext<'_>, _cell: CellCoord) -> bool {
        true
    }

    /// Tears down every footprint cell of the structure that `cell` belongs
    /// to, except `cell` itself which the controller overwrites.
    ///
    /// Writes made through the context are rolled back by the controller when
    /// this returns `false`.
    fn kill_multi_tile(&self, _ctx: &mut TileContext<'_>, _cell: CellCoord) -> bool {
        true
    }

    /// Called after the tile was committed to `cell`.
    fn on_placed(&self, _ctx: &mut TileContext<'_>, _cell: CellCoord) {}

    /// Called once the tile at `cell` is about to be replaced and any
    /// structure teardown has succeeded.
    fn on_destroyed(&self, _ctx: &mut TileContext<'_>, _cell: CellCoord) {}

    /// Called when one of the eight neighbours of `cell` changed.
    fn on_neighbour_change(&self, _ctx: &mut TileContext<'_>, _cell: CellCoord) {}
}

/// Errors raised while assembling a tile type table.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A tile with the same name was already registered.
    #[error("tile `{0}` is registered more than once")]
    DuplicateName(String),
    /// Every tile identifier has been allocated.
    #[error("tile table is full")]
    Exhausted,
    /// A structure footprint is empty or too large to encode.
    #[error("structure footprint {width}x{height} must span 1 to 16 cells per side")]
    InvalidFootprint {
        /// Requested footprint width.
        width: u32,
        /// Requested footprint height.
        height: u32,
    },
}

struct TileEntry {
    name: String,
    behavior: Box<dyn TileBehavior>,
}

/// Immutable mapping from tile identifier to tile behaviour.
///
/// Identifiers are dense indices allocated in registration order, so lookup
/// by identifier is a slice index.
pub struct TileTypeTable {
    entries: Vec<TileEntry>,
    by_name: HashMap<String, TileId>,
}

impl TileTypeTable {
    /// Starts assembling a new table.
    #[must_use]
    pub fn builder() -> TileTypeTableBuilder {
        TileTypeTableBuilder::default()
    }

    /// Resolves a tile identifier, returning `None` when it is unknown.
    #[must_use]
    pub fn get(&self, id: TileId) -> Option<&dyn TileBehavior> {
        self.entries
            .get(usize::from(id.get()))
            .map(|entry| entry.behavior.as_ref())
    }

    /// Resolves a tile identifier known to be registered.
    ///
    /// # Panics
    ///
    /// Panics when `id` was not allocated by this table. Terrain cells only
    /// ever hold identifiers validated against the table, so reaching the
    /// panic means the terrain was driven with a different table.
    #[must_use]
    pub fn tile(&self, id: TileId) -> &dyn TileBehavior {
        match self.get(id) {
            Some(behavior) => behavior,
            None => panic!("tile {} is not registered", id.get()),
        }
    }

    /// Reports whether the identifier was allocated by this table.
    #[must_use]
    pub fn contains(&self, id: TileId) -> bool {
        usize::from(id.get()) < self.entries.len()
    }

    /// Looks up the identifier registered under `name`.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<TileId> {
        self.by_name.get(name).copied()
    }

    /// Name the tile was registered under.
    #[must_use]
    pub fn name(&self, id: TileId) -> Option<&str> {
        self.entries
            .get(usize::from(id.get()))
            .map(|entry| entry.name.as_str())
    }

    /// Number of registered tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether no tile was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for TileTypeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| entry.name.as_str()))
            .finish()
    }
}

/// Collects tile behaviours before freezing them into a [`TileTypeTable`].
#[derive(Default)]
pub struct TileTypeTableBuilder {
    entries: Vec<TileEntry>,
    by_name: HashMap<String, TileId>,
}

impl TileTypeTableBuilder {
    /// Registers a behaviour under a unique name and allocates its identifier.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        behavior: Box<dyn TileBehavior>,
    ) -> Result<TileId, RegistryError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        let raw = u16::try_from(self.entries.len()).map_err(|_| RegistryError::Exhausted)?;
        let id = TileId::new(raw);
        let _ = self.by_name.insert(name.clone(), id);
        self.entries.push(TileEntry { name, behavior });
        Ok(id)
    }

    /// Freezes the registered behaviours into an immutable table.
    #[must_use]
    pub fn build(self) -> TileTypeTable {
        TileTypeTable {
            entries: self.entries,
            by_name: self.by_name,
        }
    }
}

/// View of the terrain handed to tile behaviour hooks.
///
/// Reads are bounds-checked. Every write is journalled: the controller uses
/// the journal to roll a failed multi-tile operation back to the exact prior
/// grid state, and to notify listeners about every cell a committed operation
/// touched.
pub struct TileContext<'a> {
    grid: &'a mut Grid,
    tiles: &'a TileTypeTable,
    journal: Vec<(CellCoord, Cell)>,
}

impl<'a> TileContext<'a> {
    pub(crate) fn new(grid: &'a mut Grid, tiles: &'a TileTypeTable) -> Self {
        Self {
            grid,
            tiles,
            journal: Vec::new(),
        }
    }

    /// Tile type table the operation runs against.
    #[must_use]
    pub fn tiles(&self) -> &TileTypeTable {
        self.tiles
    }

    /// Column and row count of the grid.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.grid.dimensions()
    }

    /// Reports whether the coordinate lies inside the grid.
    #[must_use]
    pub fn is_valid_position(&self, cell: CellCoord) -> bool {
        self.grid.is_valid_position(cell)
    }

    /// Current content of a cell, or `None` outside the grid.
    #[must_use]
    pub fn cell(&self, cell: CellCoord) -> Option<Cell> {
        self.grid.get(cell).copied()
    }

    /// Tile currently occupying a cell, or `None` outside the grid.
    #[must_use]
    pub fn tile(&self, cell: CellCoord) -> Option<TileId> {
        self.cell(cell).map(|value| value.tile())
    }

    /// Overwrites a cell without running any hooks.
    ///
    /// Returns `false`, leaving the grid untouched, when the coordinate lies
    /// outside the grid or the tile is not registered.
    pub fn set_cell(&mut self, cell: CellCoord, value: Cell) -> bool {
        if !self.grid.is_valid_position(cell) || !self.tiles.contains(value.tile()) {
            return false;
        }
        let slot = self.grid.cell_mut(cell);
        self.journal.push((cell, *slot));
        *slot = value;
        true
    }

    /// Overwrites the metadata of a cell, keeping its tile.
    ///
    /// Returns `false` when the coordinate lies outside the grid.
    pub fn set_metadata(&mut self, cell: CellCoord, metadata: u8) -> bool {
        match self.cell(cell) {
            Some(current) => self.set_cell(cell, current.with_metadata(metadata)),
            None => false,
        }
    }

    /// Restores every journalled write in reverse order.
    pub(crate) fn rollback(&mut self) {
        while let Some((cell, previous)) = self.journal.pop() {
            *self.grid.cell_mut(cell) = previous;
        }
    }

    /// Consumes the context, yielding each written coordinate once in the
    /// order it was first written.
    pub(crate) fn into_touched(self) -> Vec<CellCoord> {
        let mut touched: Vec<CellCoord> = Vec::with_capacity(self.journal.len());
        for (cell, _) in self.journal {
            if !touched.contains(&cell) {
                touched.push(cell);
            }
        }
        touched
    }
}
