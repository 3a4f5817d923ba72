#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Strata terrain engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative terrain, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the terrain executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values describing what
//! was committed or rejected. Systems observe individual cell changes through
//! change listeners and query the terrain for the current state of a cell.

use serde::{Deserialize, Serialize};

/// Commands that express all permissible terrain mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Replaces the terrain with a fresh grid of the provided dimensions.
    ConfigureTerrain {
        /// Number of cell columns laid out in the grid.
        columns: u32,
        /// Number of cell rows laid out in the grid.
        rows: u32,
        /// Tile every cell of the new grid starts out with.
        fill: TileId,
    },
    /// Requests a standard placement that honours the replace check.
    SetTile {
        /// Cell receiving the tile.
        cell: CellCoord,
        /// Tile to place.
        tile: TileId,
    },
    /// Requests a world-generation placement that skips the replace check.
    GenSetTile {
        /// Cell receiving the tile.
        cell: CellCoord,
        /// Tile to place.
        tile: TileId,
        /// Whether the eight neighbours are notified of the change.
        update_neighbours: bool,
    },
    /// Requests privileged removal of the tile occupying a cell.
    RemoveTile {
        /// Cell whose tile is removed.
        cell: CellCoord,
        /// Tile written in place of the removed one.
        replacement: TileId,
    },
    /// Overwrites the opaque metadata byte of a cell.
    SetMetadata {
        /// Cell whose metadata changes.
        cell: CellCoord,
        /// New metadata payload.
        metadata: u8,
    },
}

/// Events broadcast by the terrain after processing commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// Confirms that the terrain was rebuilt with new dimensions.
    TerrainConfigured {
        /// Number of cell columns in the new grid.
        columns: u32,
        /// Number of cell rows in the new grid.
        rows: u32,
    },
    /// Reports that a terrain configuration request was rejected.
    ConfigurationRejected {
        /// Requested number of columns.
        columns: u32,
        /// Requested number of rows.
        rows: u32,
        /// Requested fill tile.
        fill: TileId,
    },
    /// Confirms that a tile was committed to a cell.
    TilePlaced {
        /// Cell that received the tile.
        cell: CellCoord,
        /// Tile that occupied the cell before the placement.
        previous: TileId,
        /// Tile now occupying the cell.
        tile: TileId,
    },
    /// Confirms that a tile was removed and replaced.
    TileRemoved {
        /// Cell whose tile was removed.
        cell: CellCoord,
        /// Tile that occupied the cell before the removal.
        previous: TileId,
        /// Tile written in place of the removed one.
        replacement: TileId,
    },
    /// Reports that a placement or removal was rejected without mutation.
    TileRejected {
        /// Cell targeted by the request.
        cell: CellCoord,
        /// Tile requested for the cell.
        tile: TileId,
        /// Specific reason the mutation was refused.
        reason: PlacementRejection,
    },
    /// Confirms that the metadata of a cell changed.
    MetadataChanged {
        /// Cell whose metadata changed.
        cell: CellCoord,
        /// Metadata now stored in the cell.
        metadata: u8,
    },
}

/// Identifier of a tile type registered in the tile type table.
///
/// The identifier is a lookup key, not an owning reference: it resolves to a
/// behaviour only through the table that allocated it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(u16);

impl TileId {
    /// Creates a new tile identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }
}

/// Fixed-size record stored inline in the terrain grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    tile: TileId,
    metadata: u8,
}

impl Cell {
    /// Creates a cell holding the provided tile and metadata.
    #[must_use]
    pub const fn new(tile: TileId, metadata: u8) -> Self {
        Self { tile, metadata }
    }

    /// Tile occupying the cell.
    #[must_use]
    pub const fn tile(&self) -> TileId {
        self.tile
    }

    /// Opaque payload whose meaning is defined by the tile type.
    #[must_use]
    pub const fn metadata(&self) -> u8 {
        self.metadata
    }

    /// Returns a copy of the cell carrying different metadata.
    #[must_use]
    pub const fn with_metadata(self, metadata: u8) -> Self {
        Self {
            tile: self.tile,
            metadata,
        }
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
///
/// Columns are the fast-varying dimension of the row-major grid. Rows grow
/// downwards, so "top" means a smaller row index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Offsets the coordinate by a signed column and row delta.
    ///
    /// Returns `None` when the result would leave the unsigned coordinate
    /// space. The upper grid bounds are not known here and must be checked by
    /// the caller.
    #[must_use]
    pub fn offset(self, columns: i32, rows: i32) -> Option<CellCoord> {
        let column = self.column.checked_add_signed(columns)?;
        let row = self.row.checked_add_signed(rows)?;
        Some(CellCoord::new(column, row))
    }

    /// Returns the neighbouring coordinate in the provided direction.
    #[must_use]
    pub fn neighbour(self, neighbour: Neighbour) -> Option<CellCoord> {
        let (columns, rows) = neighbour.delta();
        self.offset(columns, rows)
    }
}

/// One of the eight cells surrounding a coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Neighbour {
    /// Previous row, previous column.
    TopLeft,
    /// Previous row, same column.
    Top,
    /// Previous row, next column.
    TopRight,
    /// Same row, previous column.
    Left,
    /// Same row, next column.
    Right,
    /// Next row, previous column.
    BottomLeft,
    /// Next row, same column.
    Bottom,
    /// Next row, next column.
    BottomRight,
}

impl Neighbour {
    /// Column and row delta leading from a cell to this neighbour.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::TopLeft => (-1, -1),
            Self::Top => (0, -1),
            Self::TopRight => (1, -1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::BottomLeft => (-1, 1),
            Self::Bottom => (0, 1),
            Self::BottomRight => (1, 1),
        }
    }
}

/// Moore neighbourhood in the order the invalidation cascade visits it.
pub const MOORE_NEIGHBOURHOOD: [Neighbour; 8] = [
    Neighbour::TopLeft,
    Neighbour::Top,
    Neighbour::TopRight,
    Neighbour::Left,
    Neighbour::Right,
    Neighbour::BottomLeft,
    Neighbour::Bottom,
    Neighbour::BottomRight,
];

/// Axis-aligned rectangle expressed in cell coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRect {
    origin: CellCoord,
    size: CellRectSize,
}

impl CellRect {
    /// Constructs a rectangle from an origin cell and size.
    #[must_use]
    pub const fn from_origin_and_size(origin: CellCoord, size: CellRectSize) -> Self {
        Self { origin, size }
    }

    /// Upper-left cell that anchors the rectangle.
    #[must_use]
    pub const fn origin(&self) -> CellCoord {
        self.origin
    }

    /// Dimensions of the rectangle measured in whole cells.
    #[must_use]
    pub const fn size(&self) -> CellRectSize {
        self.size
    }

    /// Reports whether the rectangle covers the provided cell.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        let column = u64::from(cell.column());
        let row = u64::from(cell.row());
        let left = u64::from(self.origin.column());
        let top = u64::from(self.origin.row());
        column >= left
            && row >= top
            && column < left + u64::from(self.size.width())
            && row < top + u64::from(self.size.height())
    }

    /// Iterates the covered cells in row-major order.
    ///
    /// Cells whose coordinates would overflow `u32` are skipped.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        let origin = self.origin;
        let size = self.size;
        (0..size.height()).flat_map(move |row| {
            (0..size.width()).filter_map(move |column| {
                let column = origin.column().checked_add(column)?;
                let row = origin.row().checked_add(row)?;
                Some(CellCoord::new(column, row))
            })
        })
    }
}

/// Size of a [`CellRect`] measured in whole cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRectSize {
    width: u32,
    height: u32,
}

impl CellRectSize {
    /// Creates a new size descriptor with explicit dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width of the rectangle in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the rectangle in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }
}

/// Preset world dimensions offered when creating a new terrain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorldSize {
    /// 4200 by 1200 cells.
    Small,
    /// 6400 by 1800 cells.
    #[default]
    Normal,
    /// 8400 by 2400 cells.
    Large,
    /// 16800 by 4800 cells.
    Huge,
}

impl WorldSize {
    /// Column and row count of the preset.
    #[must_use]
    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Small => (4200, 1200),
            Self::Normal => (6400, 1800),
            Self::Large => (8400, 2400),
            Self::Huge => (16800, 4800),
        }
    }
}

/// Reasons a placement or removal request may be rejected by the terrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementRejection {
    /// The requested cell lies outside the configured grid.
    OutOfBounds,
    /// The requested tile is not registered in the tile type table.
    UnknownTile,
    /// The tile currently occupying the cell refused to be replaced.
    Protected,
    /// The multi-tile structure occupying the cell could not be torn down.
    TeardownFailed,
    /// The footprint of the requested multi-tile structure could not be claimed.
    FootprintBlocked,
}
