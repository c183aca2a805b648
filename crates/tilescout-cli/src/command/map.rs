use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Subcommand, ValueEnum};
use tilescout_store::{MapTileState, MapTileStore};

use crate::config::AppConfig;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct MapArg {
    /// Map store file
    #[arg(long)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: MapCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum MapCommand {
    /// Record what is known about one coordinate
    #[command(allow_negative_numbers = true)]
    Mark {
        map: String,
        x: i32,
        y: i32,
        #[arg(value_enum)]
        state: StateArg,
    },
    /// Draw the known coordinates of a map
    Show { map: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StateArg {
    Walkable,
    Blocked,
    Unknown,
}

impl From<StateArg> for MapTileState {
    fn from(state: StateArg) -> Self {
        match state {
            StateArg::Walkable => Self::Walkable,
            StateArg::Blocked => Self::Blocked,
            StateArg::Unknown => Self::Unknown,
        }
    }
}

fn mark(path: &Path, map: &str, x: i32, y: i32, state: MapTileState) -> anyhow::Result<()> {
    let mut store = MapTileStore::load(path);
    store.set(map, x, y, state);
    store
        .save(path)
        .with_context(|| format!("Failed to save map store: {}", path.display()))
}

/// Renders known coordinates as rows of `.` (walkable), `#` (blocked) and
/// spaces, bounded by the extremes of what is known.
fn render(store: &MapTileStore, map: &str) -> Option<String> {
    let tiles: Vec<_> = store.tiles(map).collect();
    let min_x = tiles.iter().map(|((x, _), _)| *x).min()?;
    let max_x = tiles.iter().map(|((x, _), _)| *x).max()?;
    let min_y = tiles.iter().map(|((_, y), _)| *y).min()?;
    let max_y = tiles.iter().map(|((_, y), _)| *y).max()?;

    let mut out = String::new();
    for y in min_y..=max_y {
        let row: String = (min_x..=max_x)
            .map(|x| match store.get(map, x, y) {
                MapTileState::Walkable => '.',
                MapTileState::Blocked => '#',
                MapTileState::Unknown => ' ',
            })
            .collect();
        out.push_str(row.trim_end());
        out.push('\n');
    }
    Some(out)
}

pub(crate) fn run(config: &AppConfig, arg: &MapArg) -> anyhow::Result<()> {
    let path = arg.store.as_deref().unwrap_or(&config.store.maps);
    match &arg.command {
        MapCommand::Mark { map, x, y, state } => {
            mark(path, map, *x, *y, (*state).into())?;
            println!("Marked {map} ({x}, {y}) as {state:?}");
        }
        MapCommand::Show { map } => {
            let store = MapTileStore::load(path);
            match render(&store, map) {
                Some(grid) => {
                    let (walkable, blocked) = store.tiles(map).fold((0, 0), |(w, b), (_, s)| {
                        (w + usize::from(s.is_walkable()), b + usize::from(s.is_blocked()))
                    });
                    println!("{map}: {walkable} walkable, {blocked} blocked");
                    print!("{grid}");
                }
                None => println!("{map}: nothing known"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_then_unmark() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maps.json");
        mark(&path, "town", -1, 2, MapTileState::Blocked).unwrap();
        mark(&path, "town", 0, 2, MapTileState::Walkable).unwrap();
        assert_eq!(MapTileStore::load(&path).get("town", -1, 2), MapTileState::Blocked);

        mark(&path, "town", -1, 2, MapTileState::Unknown).unwrap();
        let store = MapTileStore::load(&path);
        assert_eq!(store.get("town", -1, 2), MapTileState::Unknown);
        assert_eq!(store.tiles("town").count(), 1);
    }

    #[test]
    fn test_render_bounds_and_gaps() {
        let mut store = MapTileStore::new();
        store.mark_walkable("route", 0, 0);
        store.mark_blocked("route", 2, 0);
        store.mark_walkable("route", 1, 2);
        assert_eq!(render(&store, "route").unwrap(), ". #\n\n .\n");
        assert!(render(&store, "cave").is_none());
    }
}
