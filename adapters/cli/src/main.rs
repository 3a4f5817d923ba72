#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for creating, inspecting and editing Strata worlds.

mod content;
mod report;

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use strata_core::{CellCoord, PlacementRejection, WorldSize};
use strata_terrain::{persist, query, SetTileOptions, Terrain, TileTypeTable};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments accepted by the `strata` binary.
#[derive(Debug, Parser)]
#[command(name = "strata", version, about = "Create, inspect and edit terrain worlds")]
struct Cli {
    /// Tile manifest to use instead of the bundled one.
    #[arg(long, global = true, value_name = "PATH")]
    manifest: Option<PathBuf>,

    /// Writes a tile histogram report after the command; failures only warn.
    #[arg(long, global = true, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Enables debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Creates a world filled with one tile and saves it.
    New {
        /// Destination world file.
        output: PathBuf,
        /// World size preset; ignored when columns and rows are given.
        #[arg(long, value_enum, default_value_t = SizeArg::Normal)]
        size: SizeArg,
        /// Explicit column count.
        #[arg(long, requires = "rows")]
        columns: Option<u32>,
        /// Explicit row count.
        #[arg(long, requires = "columns")]
        rows: Option<u32>,
        /// Tile every cell starts out with.
        #[arg(long, default_value = "air")]
        fill: String,
    },
    /// Prints the dimensions and tile histogram of a world.
    Info {
        /// World file to inspect.
        world: PathBuf,
    },
    /// Places a tile and saves the world.
    Set {
        /// World file to edit in place.
        world: PathBuf,
        /// Target column.
        column: u32,
        /// Target row.
        row: u32,
        /// Name of the tile to place.
        tile: String,
        /// Skips the replace check like world generation does.
        #[arg(long)]
        generate: bool,
    },
    /// Removes the tile at a cell and saves the world.
    Remove {
        /// World file to edit in place.
        world: PathBuf,
        /// Target column.
        column: u32,
        /// Target row.
        row: u32,
        /// Tile written in place of the removed one.
        #[arg(long, default_value = "air")]
        replacement: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SizeArg {
    Small,
    Normal,
    Large,
    Huge,
}

impl From<SizeArg> for WorldSize {
    fn from(size: SizeArg) -> Self {
        match size {
            SizeArg::Small => WorldSize::Small,
            SizeArg::Normal => WorldSize::Normal,
            SizeArg::Large => WorldSize::Large,
            SizeArg::Huge => WorldSize::Huge,
        }
    }
}

/// Entry point for the Strata command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let tiles = match &cli.manifest {
        Some(path) => content::load_tile_table(path)?,
        None => content::default_tile_table()?,
    };
    let terrain = run(cli.command, &tiles)?;

    if let Some(path) = &cli.report {
        if let Err(error) = report::write(path, &terrain, &tiles) {
            let detail = format!("{error:#}");
            warn!(path = %path.display(), error = %detail, "failed to write terrain report");
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn run(action: Action, tiles: &TileTypeTable) -> Result<Terrain> {
    match action {
        Action::New {
            output,
            size,
            columns,
            rows,
            fill,
        } => {
            let fill = content::resolve(tiles, &fill)?;
            let terrain = match (columns, rows) {
                (Some(columns), Some(rows)) => Terrain::new(tiles, columns, rows, fill)?,
                _ => Terrain::with_size(tiles, size.into(), fill)?,
            };
            save(&terrain, &output)?;
            let (columns, rows) = query::dimensions(&terrain);
            println!("created {columns}x{rows} world at {}", output.display());
            Ok(terrain)
        }
        Action::Info { world } => {
            let terrain = load(tiles, &world)?;
            let (columns, rows) = query::dimensions(&terrain);
            println!("{}: {columns}x{rows}", world.display());
            for (tile, count) in query::tile_histogram(&terrain) {
                let name = tiles.name(tile).unwrap_or("?");
                println!("  {name:<16} {count}");
            }
            Ok(terrain)
        }
        Action::Set {
            world,
            column,
            row,
            tile,
            generate,
        } => {
            let id = content::resolve(tiles, &tile)?;
            let options = SetTileOptions {
                ignore_replace_check: generate,
                update_neighbours: true,
            };
            edit(tiles, &world, CellCoord::new(column, row), |terrain, cell| {
                terrain.set_tile_advanced(tiles, cell, id, options)
            })
        }
        Action::Remove {
            world,
            column,
            row,
            replacement,
        } => {
            let id = content::resolve(tiles, &replacement)?;
            edit(tiles, &world, CellCoord::new(column, row), |terrain, cell| {
                terrain.set_tile_advanced(tiles, cell, id, SetTileOptions::PRIVILEGED)
            })
        }
    }
}

fn edit<F>(tiles: &TileTypeTable, world: &Path, cell: CellCoord, mutate: F) -> Result<Terrain>
where
    F: FnOnce(&mut Terrain, CellCoord) -> Result<(), PlacementRejection>,
{
    let mut terrain = load(tiles, world)?;
    if let Err(reason) = mutate(&mut terrain, cell) {
        bail!(
            "mutation at ({}, {}) was rejected: {reason:?}",
            cell.column(),
            cell.row()
        );
    }
    save(&terrain, world)?;
    info!(column = cell.column(), row = cell.row(), "world updated");
    Ok(terrain)
}

fn load(tiles: &TileTypeTable, path: &Path) -> Result<Terrain> {
    let file = File::open(path)
        .with_context(|| format!("failed to open world at {}", path.display()))?;
    persist::load(tiles, BufReader::new(file))
        .with_context(|| format!("failed to load world at {}", path.display()))
}

fn save(terrain: &Terrain, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create world at {}", path.display()))?;
    persist::save(terrain, BufWriter::new(file))
        .with_context(|| format!("failed to save world at {}", path.display()))
}
