use std::{collections::HashMap, fs, path::Path};

use anyhow::{bail, Context, Result};
use strata_core::{CellRectSize, TileId};
use strata_terrain::{Plain, Protected, Structure, TileBehavior, TileTypeTable};

const SUPPORTED_MANIFEST_VERSION: u32 = 1;

/// Tile manifest bundled with the binary.
const DEFAULT_MANIFEST: &str = include_str!("../assets/tiles.toml");

/// Builds the tile table described by the bundled manifest.
pub(crate) fn default_tile_table() -> Result<TileTypeTable> {
    parse_manifest(DEFAULT_MANIFEST).context("bundled tile manifest is invalid")
}

/// Builds the tile table described by the manifest at `path`.
pub(crate) fn load_tile_table(path: &Path) -> Result<TileTypeTable> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read tile manifest at {}", path.display()))?;
    parse_manifest(&contents)
        .with_context(|| format!("invalid tile manifest at {}", path.display()))
}

/// Resolves a tile name against the table.
pub(crate) fn resolve(tiles: &TileTypeTable, name: &str) -> Result<TileId> {
    tiles
        .id_of(name)
        .with_context(|| format!("unknown tile `{name}`"))
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    version: u32,
    tiles: Vec<TileEntry>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TileEntry {
    name: String,
    kind: String,
    width: Option<u32>,
    height: Option<u32>,
    ground: Option<String>,
}

fn parse_manifest(contents: &str) -> Result<TileTypeTable> {
    let manifest: Manifest =
        toml::from_str(contents).context("failed to parse tile manifest toml contents")?;
    if manifest.version != SUPPORTED_MANIFEST_VERSION {
        bail!(
            "unsupported tile manifest version {}; expected {}",
            manifest.version,
            SUPPORTED_MANIFEST_VERSION
        );
    }
    if manifest.tiles.is_empty() {
        bail!("tile manifest declares no tiles");
    }

    let mut builder = TileTypeTable::builder();
    let mut declared: HashMap<String, TileId> = HashMap::with_capacity(manifest.tiles.len());
    for entry in manifest.tiles {
        let behavior = behavior_for(&entry, &declared)
            .with_context(|| format!("invalid definition for tile `{}`", entry.name))?;
        let id = builder
            .register(entry.name.clone(), behavior)
            .with_context(|| format!("failed to register tile `{}`", entry.name))?;
        let _ = declared.insert(entry.name, id);
    }
    Ok(builder.build())
}

fn behavior_for(
    entry: &TileEntry,
    declared: &HashMap<String, TileId>,
) -> Result<Box<dyn TileBehavior>> {
    let has_footprint = entry.width.is_some() || entry.height.is_some() || entry.ground.is_some();
    match entry.kind.as_str() {
        "plain" | "protected" if has_footprint => {
            bail!("only structures accept `width`, `height` and `ground`")
        }
        "plain" => Ok(Box::new(Plain)),
        "protected" => Ok(Box::new(Protected)),
        "structure" => {
            let (Some(width), Some(height), Some(ground)) =
                (entry.width, entry.height, entry.ground.as_deref())
            else {
                bail!("structures require `width`, `height` and `ground`");
            };
            let Some(&ground) = declared.get(ground) else {
                bail!("ground tile `{ground}` must be declared before the structure");
            };
            let structure = Structure::new(CellRectSize::new(width, height), ground)?;
            Ok(Box::new(structure))
        }
        other => bail!("unknown tile kind `{other}`"),
    }
}
