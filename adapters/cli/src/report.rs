use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;
use strata_terrain::{query, Terrain, TileTypeTable};

/// Summary of a world written next to the command output.
#[derive(Debug, PartialEq, Eq, Serialize)]
struct Report {
    columns: u32,
    rows: u32,
    tiles: BTreeMap<String, u64>,
}

impl Report {
    fn capture(terrain: &Terrain, tiles: &TileTypeTable) -> Self {
        let (columns, rows) = query::dimensions(terrain);
        let tiles = query::tile_histogram(terrain)
            .into_iter()
            .map(|(tile, count)| {
                let name = tiles
                    .name(tile)
                    .map_or_else(|| format!("#{}", tile.get()), str::to_owned);
                (name, count)
            })
            .collect();
        Self {
            columns,
            rows,
            tiles,
        }
    }
}

/// Writes a TOML histogram report for the terrain to `path`.
pub(crate) fn write(path: &Path, terrain: &Terrain, tiles: &TileTypeTable) -> Result<()> {
    let report = Report::capture(terrain, tiles);
    let contents = toml::to_string(&report).context("failed to serialise terrain report")?;
    fs::write(path, contents)
        .with_context(|| format!("failed to write terrain report to {}", path.display()))
}
