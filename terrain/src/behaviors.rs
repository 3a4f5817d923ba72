//! Stock tile behaviours shipped with the engine.
//!
//! Content packs can implement [`TileBehavior`] themselves; these cover the
//! common cases of ordinary terrain, indestructible terrain and rectangular
//! structures.

use strata_core::{Cell, CellCoord, CellRect, CellRectSize, TileId};

use crate::tiles::{RegistryError, TileBehavior, TileContext};

/// Largest structure side that fits the per-cell offset encoding.
const MAX_FOOTPRINT_SIDE: u32 = 16;

/// Ordinary single-cell tile such as air, dirt or grass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Plain;

impl TileBehavior for Plain {}

/// Single-cell tile that refuses standard replacement.
///
/// Privileged paths (generation, removal) still overwrite it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Protected;

impl TileBehavior for Protected {
    fn can_be_replaced(&self, _ctx: &TileContext<'_>, _cell: CellCoord) -> bool {
        false
    }
}

/// Rectangular multi-tile structure anchored at its upper-left cell.
///
/// Every footprint cell holds the structure's tile. The metadata byte of each
/// cell stores its offset from the anchor, column in the low nibble and row in
/// the high nibble, so any part can locate the whole footprint. Placement
/// requires the `ground` tile under every footprint cell other than the
/// anchor; teardown writes `ground` back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Structure {
    size: CellRectSize,
    ground: TileId,
}

impl Structure {
    /// Creates a structure with the provided footprint and ground tile.
    pub fn new(size: CellRectSize, ground: TileId) -> Result<Self, RegistryError> {
        let fits = |side: u32| (1..=MAX_FOOTPRINT_SIDE).contains(&side);
        if !fits(size.width()) || !fits(size.height()) {
            return Err(RegistryError::InvalidFootprint {
                width: size.width(),
                height: size.height(),
            });
        }
        Ok(Self { size, ground })
    }

    /// Dimensions of the footprint.
    #[must_use]
    pub const fn size(&self) -> CellRectSize {
        self.size
    }

    /// Tile required under the footprint and restored on teardown.
    #[must_use]
    pub const fn ground(&self) -> TileId {
        self.ground
    }

    /// Footprint of the structure that the part at `cell` belongs to.
    ///
    /// Returns `None` when the stored offset points outside the coordinate
    /// space.
    #[must_use]
    pub fn footprint(&self, cell: CellCoord, metadata: u8) -> Option<CellRect> {
        let (column, row) = decode_offset(metadata);
        let anchor = cell.offset(-i32::from(column), -i32::from(row))?;
        Some(CellRect::from_origin_and_size(anchor, self.size))
    }
}

impl TileBehavior for Structure {
    fn is_multi_tile(&self, _ctx: &TileContext<'_>, _cell: CellCoord) -> bool {
        true
    }

    fn place_multi_tile(&self, ctx: &mut TileContext<'_>, cell: CellCoord) -> bool {
        let Some(tile) = ctx.tile(cell) else {
            return false;
        };
        let footprint = CellRect::from_origin_and_size(cell, self.size);
        let mut claimed = Vec::new();
        for part in footprint.cells() {
            if part != cell && ctx.tile(part) != Some(self.ground) {
                return false;
            }
            claimed.push(part);
        }
        if claimed.len() != area(self.size) {
            return false;
        }

        for part in claimed {
            let metadata = encode_offset(cell, part);
            if !ctx.set_cell(part, Cell::new(tile, metadata)) {
                return false;
            }
        }
        true
    }

    fn kill_multi_tile(&self, ctx: &mut TileContext<'_>, cell: CellCoord) -> bool {
        let Some(current) = ctx.cell(cell) else {
            return false;
        };
        let Some(footprint) = self.footprint(cell, current.metadata()) else {
            return false;
        };
        let anchor = footprint.origin();

        for part in footprint.cells() {
            if part == cell {
                continue;
            }
            let expected = Cell::new(current.tile(), encode_offset(anchor, part));
            if ctx.cell(part) != Some(expected) {
                return false;
            }
            if !ctx.set_cell(part, Cell::new(self.ground, 0)) {
                return false;
            }
        }
        true
    }
}

fn area(size: CellRectSize) -> usize {
    size.width() as usize * size.height() as usize
}

fn encode_offset(anchor: CellCoord, part: CellCoord) -> u8 {
    let column = part.column().saturating_sub(anchor.column()).min(15) as u8;
    let row = part.row().saturating_sub(anchor.row()).min(15) as u8;
    (row << 4) | column
}

fn decode_offset(metadata: u8) -> (u8, u8) {
    (metadata & 0x0f, metadata >> 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_round_trip_through_metadata() {
        let anchor = CellCoord::new(10, 20);
        let part = CellCoord::new(13, 22);
        let metadata = encode_offset(anchor, part);
        assert_eq!(decode_offset(metadata), (3, 2));
    }

    #[test]
    fn footprint_is_recovered_from_any_part() {
        let structure =
            Structure::new(CellRectSize::new(3, 2), TileId::new(0)).expect("valid footprint");
        let anchor = CellCoord::new(4, 4);
        let part = CellCoord::new(6, 5);

        let footprint = structure
            .footprint(part, encode_offset(anchor, part))
            .expect("footprint");
        assert_eq!(footprint.origin(), anchor);
        assert_eq!(footprint.size(), CellRectSize::new(3, 2));
    }

    #[test]
    fn oversized_footprints_are_rejected() {
        assert!(Structure::new(CellRectSize::new(17, 1), TileId::new(0)).is_err());
        assert!(Structure::new(CellRectSize::new(2, 0), TileId::new(0)).is_err());
        assert!(Structure::new(CellRectSize::new(16, 16), TileId::new(0)).is_ok());
    }
}
