//! Dense row-major cell storage backing the terrain.

use strata_core::{Cell, CellCoord};

/// Upper bound on the number of cells a grid may hold.
///
/// Matches the largest world-size preset so persisted headers cannot request
/// arbitrarily large allocations.
pub(crate) const MAX_CELLS: u64 = 16_800 * 4_800;

/// Flat array of `columns * rows` cells with O(1) addressing.
///
/// The grid performs no validation on its accessors beyond what the slice
/// itself enforces: positions must be checked with
/// [`Grid::is_valid_position`] by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Grid {
    columns: u32,
    rows: u32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Allocates a grid with every cell set to `fill`.
    ///
    /// Returns `None` when either dimension is zero or the cell count exceeds
    /// [`MAX_CELLS`].
    pub(crate) fn filled(columns: u32, rows: u32, fill: Cell) -> Option<Self> {
        let capacity = capacity_for(columns, rows)?;
        Some(Self {
            columns,
            rows,
            cells: vec![fill; capacity],
        })
    }

    /// Wraps previously decoded cells, which must already be in row-major order.
    pub(crate) fn from_cells(columns: u32, rows: u32, cells: Vec<Cell>) -> Option<Self> {
        let capacity = capacity_for(columns, rows)?;
        if cells.len() != capacity {
            return None;
        }
        Some(Self {
            columns,
            rows,
            cells,
        })
    }

    pub(crate) fn is_valid_position(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }

    /// Returns the cell at a validated position.
    pub(crate) fn cell(&self, cell: CellCoord) -> &Cell {
        &self.cells[self.index(cell)]
    }

    /// Returns the cell at a validated position for mutation.
    pub(crate) fn cell_mut(&mut self, cell: CellCoord) -> &mut Cell {
        let index = self.index(cell);
        &mut self.cells[index]
    }

    /// Returns the cell at the position, or `None` when it lies outside the grid.
    pub(crate) fn get(&self, cell: CellCoord) -> Option<&Cell> {
        if self.is_valid_position(cell) {
            Some(self.cell(cell))
        } else {
            None
        }
    }

    pub(crate) fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    /// Iterates every coordinate once in row-major order.
    pub(crate) fn positions(&self) -> impl Iterator<Item = CellCoord> {
        let columns = self.columns;
        (0..self.rows).flat_map(move |row| (0..columns).map(move |column| CellCoord::new(column, row)))
    }

    fn index(&self, cell: CellCoord) -> usize {
        debug_assert!(
            self.is_valid_position(cell),
            "cell {cell:?} outside {}x{} grid",
            self.columns,
            self.rows
        );
        cell.row() as usize * self.columns as usize + cell.column() as usize
    }
}

fn capacity_for(columns: u32, rows: u32) -> Option<usize> {
    if columns == 0 || rows == 0 {
        return None;
    }
    let capacity = u64::from(columns) * u64::from(rows);
    if capacity > MAX_CELLS {
        return None;
    }
    usize::try_from(capacity).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::TileId;

    #[test]
    fn addressing_is_row_major() {
        let mut grid = Grid::filled(4, 3, Cell::new(TileId::new(0), 0)).expect("grid");
        *grid.cell_mut(CellCoord::new(2, 1)) = Cell::new(TileId::new(9), 1);

        let index = grid
            .cells()
            .iter()
            .position(|cell| cell.tile() == TileId::new(9))
            .expect("written cell");
        assert_eq!(index, 4 + 2);
    }

    #[test]
    fn bounds_check_rejects_edges() {
        let grid = Grid::filled(4, 3, Cell::new(TileId::new(0), 0)).expect("grid");
        assert!(grid.is_valid_position(CellCoord::new(3, 2)));
        assert!(!grid.is_valid_position(CellCoord::new(4, 2)));
        assert!(!grid.is_valid_position(CellCoord::new(3, 3)));
        assert!(grid.get(CellCoord::new(4, 0)).is_none());
    }

    #[test]
    fn zero_and_oversized_dimensions_are_rejected() {
        let fill = Cell::new(TileId::new(0), 0);
        assert!(Grid::filled(0, 10, fill).is_none());
        assert!(Grid::filled(10, 0, fill).is_none());
        assert!(Grid::filled(16_801, 4_800, fill).is_none());
    }

    #[test]
    fn from_cells_requires_matching_length() {
        let cells = vec![Cell::new(TileId::new(1), 0); 5];
        assert!(Grid::from_cells(2, 3, cells.clone()).is_none());
        assert!(Grid::from_cells(5, 1, cells).is_some());
    }

    #[test]
    fn positions_cover_grid_once() {
        let grid = Grid::filled(3, 2, Cell::new(TileId::new(0), 0)).expect("grid");
        let positions: Vec<CellCoord> = grid.positions().collect();
        assert_eq!(positions.len(), 6);
        assert_eq!(positions[0], CellCoord::new(0, 0));
        assert_eq!(positions[3], CellCoord::new(0, 1));
        assert_eq!(grid.dimensions(), (3, 2));
    }
}
