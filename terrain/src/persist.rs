//! Binary save format for terrain grids.
//!
//! The stream is a header carrying the format version and the grid
//! dimensions, followed by every cell record in row-major order. Loading
//! validates the dimensions before allocating and checks every tile against
//! the table before any of the decoded cells become visible.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use strata_core::{Cell, CellCoord, TileId};
use thiserror::Error;
use tracing::info;

use crate::{
    grid::{Grid, MAX_CELLS},
    tiles::TileTypeTable,
    Terrain,
};

/// Version written into every header.
pub const FORMAT_VERSION: u16 = 1;

/// Cells reserved up front; larger grids grow as cells decode.
const INITIAL_CELL_CAPACITY: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Header {
    version: u16,
    columns: u32,
    rows: u32,
}

/// Errors raised while saving or loading a terrain.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The stream could not be written or decoded.
    #[error("terrain stream is unreadable: {0}")]
    Encoding(#[from] bincode::Error),
    /// The header names a format this build does not understand.
    #[error("terrain format version {0} is not supported")]
    UnsupportedVersion(u16),
    /// The header describes an empty or oversized grid.
    #[error(
        "terrain dimensions {columns}x{rows} are not supported (at most {max} cells)",
        max = MAX_CELLS
    )]
    InvalidDimensions {
        /// Column count read from the header.
        columns: u32,
        /// Row count read from the header.
        rows: u32,
    },
    /// A cell references a tile missing from the table.
    #[error("cell ({}, {}) references unknown tile {}", .cell.column(), .cell.row(), .tile.get())]
    UnknownTile {
        /// Position of the offending cell.
        cell: CellCoord,
        /// Identifier that failed to resolve.
        tile: TileId,
    },
}

/// Writes the terrain grid to `writer`.
pub fn save<W: Write>(terrain: &Terrain, mut writer: W) -> Result<(), PersistError> {
    let (columns, rows) = terrain.grid.dimensions();
    let header = Header {
        version: FORMAT_VERSION,
        columns,
        rows,
    };
    bincode::serialize_into(&mut writer, &header)?;
    for cell in terrain.grid.cells() {
        bincode::serialize_into(&mut writer, cell)?;
    }
    writer.flush().map_err(|error| PersistError::Encoding(error.into()))?;
    info!(columns, rows, "terrain saved");
    Ok(())
}

/// Reads a terrain from `reader`, validating it against `tiles`.
///
/// The returned terrain has no listeners yet, so no re-cache pass is needed;
/// use [`load_into`] to replace the grid of a terrain that observers already
/// watch.
pub fn load<R: Read>(tiles: &TileTypeTable, reader: R) -> Result<Terrain, PersistError> {
    let grid = read_grid(tiles, reader)?;
    Ok(Terrain::from_grid(grid))
}

/// Replaces the grid of an existing terrain with one read from `reader`.
///
/// On failure the terrain is left untouched. On success the registered
/// listeners observe a single row-major re-cache pass rather than per-cell
/// mutation cascades.
pub fn load_into<R: Read>(
    terrain: &mut Terrain,
    tiles: &TileTypeTable,
    reader: R,
) -> Result<(), PersistError> {
    let grid = read_grid(tiles, reader)?;
    terrain.grid = grid;
    terrain.recache_all();
    Ok(())
}

fn read_grid<R: Read>(tiles: &TileTypeTable, mut reader: R) -> Result<Grid, PersistError> {
    let header: Header = bincode::deserialize_from(&mut reader)?;
    if header.version != FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion(header.version));
    }
    let invalid = PersistError::InvalidDimensions {
        columns: header.columns,
        rows: header.rows,
    };
    let count = u64::from(header.columns) * u64::from(header.rows);
    if count == 0 || count > MAX_CELLS {
        return Err(invalid);
    }
    let count = usize::try_from(count).map_err(|_| invalid)?;

    let mut cells = Vec::with_capacity(count.min(INITIAL_CELL_CAPACITY));
    let columns = header.columns;
    for index in 0..count {
        let cell: Cell = bincode::deserialize_from(&mut reader)?;
        if !tiles.contains(cell.tile()) {
            let column = (index % columns as usize) as u32;
            let row = (index / columns as usize) as u32;
            return Err(PersistError::UnknownTile {
                cell: CellCoord::new(column, row),
                tile: cell.tile(),
            });
        }
        cells.push(cell);
    }

    info!(columns = header.columns, rows = header.rows, "terrain loaded");
    Grid::from_cells(header.columns, header.rows, cells).ok_or(PersistError::InvalidDimensions {
        columns: header.columns,
        rows: header.rows,
    })
}
