use std::{cell::RefCell, rc::Rc};

use strata_core::{Cell, CellCoord, CellRectSize, Command, PlacementRejection, TileId};
use strata_terrain::{
    apply, ChangeListener, Plain, SetTileOptions, Structure, Terrain, TileBehavior, TileContext,
    TileTypeTable,
};

#[derive(Default)]
struct CellRecorder {
    seen: RefCell<Vec<CellCoord>>,
}

impl ChangeListener for CellRecorder {
    fn on_tile_changed(&self, cell: CellCoord) {
        self.seen.borrow_mut().push(cell);
    }
}

/// Claims to be a structure but scribbles on its right-hand neighbour and then
/// refuses to be torn down.
struct Stubborn;

impl TileBehavior for Stubborn {
    fn is_multi_tile(&self, _ctx: &TileContext<'_>, _cell: CellCoord) -> bool {
        true
    }

    fn kill_multi_tile(&self, ctx: &mut TileContext<'_>, cell: CellCoord) -> bool {
        if let Some(right) = cell.offset(1, 0) {
            let _ = ctx.set_metadata(right, 42);
        }
        false
    }
}

/// Marks the cell below itself whenever a neighbour changes.
struct Creeper;

impl TileBehavior for Creeper {
    fn on_neighbour_change(&self, ctx: &mut TileContext<'_>, cell: CellCoord) {
        if let Some(below) = cell.offset(0, 1) {
            let _ = ctx.set_metadata(below, 9);
        }
    }
}

struct Tiles {
    table: TileTypeTable,
    air: TileId,
    stone: TileId,
    bench: TileId,
    gate: TileId,
    stubborn: TileId,
    creeper: TileId,
}

fn tiles() -> Tiles {
    let mut builder = TileTypeTable::builder();
    let air = builder.register("air", Box::new(Plain)).expect("air");
    let stone = builder.register("stone", Box::new(Plain)).expect("stone");
    let bench = builder
        .register(
            "bench",
            Box::new(Structure::new(CellRectSize::new(2, 1), air).expect("bench footprint")),
        )
        .expect("bench");
    let gate = builder
        .register(
            "gate",
            Box::new(Structure::new(CellRectSize::new(3, 1), air).expect("gate footprint")),
        )
        .expect("gate");
    let stubborn = builder.register("stubborn", Box::new(Stubborn)).expect("stubborn");
    let creeper = builder.register("creeper", Box::new(Creeper)).expect("creeper");
    Tiles {
        table: builder.build(),
        air,
        stone,
        bench,
        gate,
        stubborn,
        creeper,
    }
}

fn snapshot(terrain: &Terrain) -> Vec<(CellCoord, Cell)> {
    strata_terrain::query::cells(terrain).collect()
}

#[test]
fn structure_claims_its_whole_footprint() {
    let tiles = tiles();
    let mut terrain = Terrain::new(&tiles.table, 10, 10, tiles.air).expect("terrain");
    let anchor = CellCoord::new(3, 3);

    assert!(terrain.set_tile(&tiles.table, anchor, tiles.bench));

    assert_eq!(
        terrain.get_cell(anchor),
        Some(&Cell::new(tiles.bench, 0x00))
    );
    assert_eq!(
        terrain.get_cell(CellCoord::new(4, 3)),
        Some(&Cell::new(tiles.bench, 0x01)),
        "the second part records its offset from the anchor"
    );
}

#[test]
fn blocked_footprint_leaves_the_grid_unchanged() {
    let tiles = tiles();
    let mut terrain = Terrain::new(&tiles.table, 10, 10, tiles.air).expect("terrain");
    assert!(terrain.set_tile(&tiles.table, CellCoord::new(4, 3), tiles.stone));
    let before = snapshot(&terrain);
    let recorder = Rc::new(CellRecorder::default());
    let _id = terrain.register_change_listener(&recorder);

    let outcome = terrain.set_tile_advanced(
        &tiles.table,
        CellCoord::new(3, 3),
        tiles.bench,
        SetTileOptions::STANDARD,
    );

    assert_eq!(outcome, Err(PlacementRejection::FootprintBlocked));
    assert_eq!(snapshot(&terrain), before);
    assert!(recorder.seen.borrow().is_empty());
}

#[test]
fn footprint_crossing_the_edge_is_rejected() {
    let tiles = tiles();
    let mut terrain = Terrain::new(&tiles.table, 10, 10, tiles.air).expect("terrain");

    let outcome = terrain.set_tile_advanced(
        &tiles.table,
        CellCoord::new(8, 0),
        tiles.gate,
        SetTileOptions::STANDARD,
    );

    assert_eq!(outcome, Err(PlacementRejection::FootprintBlocked));
    assert_eq!(terrain.tile(CellCoord::new(8, 0)), Some(tiles.air));
    assert_eq!(terrain.tile(CellCoord::new(9, 0)), Some(tiles.air));
}

#[test]
fn removing_any_part_tears_down_the_whole_structure() {
    let tiles = tiles();
    let mut terrain = Terrain::new(&tiles.table, 10, 10, tiles.air).expect("terrain");
    assert!(terrain.set_tile(&tiles.table, CellCoord::new(3, 3), tiles.bench));

    assert!(terrain.remove_tile(&tiles.table, CellCoord::new(4, 3), tiles.air));

    assert_eq!(terrain.get_cell(CellCoord::new(3, 3)), Some(&Cell::new(tiles.air, 0)));
    assert_eq!(terrain.get_cell(CellCoord::new(4, 3)), Some(&Cell::new(tiles.air, 0)));
}

#[test]
fn structure_metadata_cannot_be_overwritten() {
    let tiles = tiles();
    let mut terrain = Terrain::new(&tiles.table, 10, 10, tiles.air).expect("terrain");
    assert!(terrain.set_tile(&tiles.table, CellCoord::new(3, 3), tiles.bench));
    let recorder = Rc::new(CellRecorder::default());
    let _id = terrain.register_change_listener(&recorder);

    assert!(!terrain.set_metadata(&tiles.table, CellCoord::new(4, 3), 7));
    let mut events = Vec::new();
    apply(
        &mut terrain,
        &tiles.table,
        Command::SetMetadata {
            cell: CellCoord::new(3, 3),
            metadata: 7,
        },
        &mut events,
    );

    assert!(events.is_empty());
    assert!(recorder.seen.borrow().is_empty());
    assert_eq!(
        terrain.get_cell(CellCoord::new(4, 3)),
        Some(&Cell::new(tiles.bench, 0x01))
    );
    assert!(terrain.remove_tile(&tiles.table, CellCoord::new(4, 3), tiles.air));
    assert_eq!(terrain.tile(CellCoord::new(3, 3)), Some(tiles.air));
}

#[test]
fn failed_placement_restores_a_torn_down_structure() {
    let tiles = tiles();
    let mut terrain = Terrain::new(&tiles.table, 10, 10, tiles.air).expect("terrain");
    assert!(terrain.set_tile(&tiles.table, CellCoord::new(3, 3), tiles.bench));
    assert!(terrain.set_tile(&tiles.table, CellCoord::new(6, 3), tiles.stone));
    let before = snapshot(&terrain);

    // The gate would cover (4,3)..=(6,3) but (6,3) is stone.
    assert!(!terrain.set_tile(&tiles.table, CellCoord::new(4, 3), tiles.gate));

    assert_eq!(
        snapshot(&terrain),
        before,
        "the bench torn down for the gate must be restored"
    );
}

#[test]
fn failed_teardown_rolls_back_partial_writes() {
    let tiles = tiles();
    let mut terrain = Terrain::new(&tiles.table, 10, 10, tiles.air).expect("terrain");
    assert!(terrain.gen_set_tile(&tiles.table, CellCoord::new(2, 2), tiles.stubborn, false));
    let before = snapshot(&terrain);

    let outcome = terrain.set_tile_advanced(
        &tiles.table,
        CellCoord::new(2, 2),
        tiles.air,
        SetTileOptions::PRIVILEGED,
    );

    assert_eq!(outcome, Err(PlacementRejection::TeardownFailed));
    assert_eq!(snapshot(&terrain), before);
    assert_eq!(terrain.metadata(CellCoord::new(3, 2)), Some(0));
}

#[test]
fn every_claimed_cell_is_notified_exactly_once() {
    let tiles = tiles();
    let mut terrain = Terrain::new(&tiles.table, 10, 10, tiles.air).expect("terrain");
    let recorder = Rc::new(CellRecorder::default());
    let _id = terrain.register_change_listener(&recorder);

    assert!(terrain.set_tile(&tiles.table, CellCoord::new(0, 5), tiles.gate));

    let seen = recorder.seen.borrow();
    assert_eq!(
        seen.as_slice(),
        &[
            CellCoord::new(0, 5),
            CellCoord::new(0, 4),
            CellCoord::new(1, 4),
            CellCoord::new(1, 5),
            CellCoord::new(0, 6),
            CellCoord::new(1, 6),
            CellCoord::new(2, 5),
        ],
        "footprint cells outside the neighbourhood follow the cascade"
    );
}

#[test]
fn neighbour_hook_writes_are_notified_after_the_cascade() {
    let tiles = tiles();
    let mut terrain = Terrain::new(&tiles.table, 10, 10, tiles.air).expect("terrain");
    assert!(terrain.gen_set_tile(&tiles.table, CellCoord::new(6, 6), tiles.creeper, false));
    let recorder = Rc::new(CellRecorder::default());
    let _id = terrain.register_change_listener(&recorder);

    assert!(terrain.set_tile(&tiles.table, CellCoord::new(5, 5), tiles.stone));

    assert_eq!(terrain.metadata(CellCoord::new(6, 7)), Some(9));
    let seen = recorder.seen.borrow();
    assert_eq!(seen.len(), 10);
    assert_eq!(seen.last(), Some(&CellCoord::new(6, 7)));
}
