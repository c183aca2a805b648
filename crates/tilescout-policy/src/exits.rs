use tilescout_vision::{TileGrid, TilePos};

use crate::{action::Direction, memory::DirectionSet};

/// A dark edge tile that looks like a doorway.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exit {
    pub pos: TilePos,
    pub direction: Direction,
    /// Euclidean distance from the player tile, in tiles.
    pub distance: f32,
}

impl Exit {
    /// Distance plus `penalty` if the exit's direction is in `tried`.
    #[must_use]
    pub fn score(&self, tried: DirectionSet, penalty: f32) -> f32 {
        if tried.contains(self.direction) {
            self.distance + penalty
        } else {
            self.distance
        }
    }
}

/// Direction of the dominant axis from `from` towards `to`.
///
/// Horizontal wins a tie. Returns `None` if both positions coincide.
#[must_use]
pub fn direction_towards(from: TilePos, to: TilePos) -> Option<Direction> {
    let dx = to.col.abs_diff(from.col);
    let dy = to.row.abs_diff(from.row);
    if dx == 0 && dy == 0 {
        return None;
    }
    let dir = if dx >= dy {
        if to.col > from.col {
            Direction::Right
        } else {
            Direction::Left
        }
    } else if to.row > from.row {
        Direction::Down
    } else {
        Direction::Up
    };
    Some(dir)
}

/// Edge tiles darker than `threshold`, excluding the player's own tile.
pub fn find_exits(
    grid: &TileGrid,
    player: TilePos,
    threshold: f32,
) -> impl Iterator<Item = Exit> + '_ {
    grid.edge_tiles()
        .filter(move |tile| tile.dark_ratio > threshold)
        .filter_map(move |tile| {
            let direction = direction_towards(player, tile.pos)?;
            Some(Exit {
                pos: tile.pos,
                direction,
                distance: player.distance(tile.pos),
            })
        })
}

/// Lowest-scored exit; the first one found wins a tie.
#[must_use]
pub fn best_exit(
    grid: &TileGrid,
    player: TilePos,
    threshold: f32,
    tried: DirectionSet,
    penalty: f32,
) -> Option<Exit> {
    find_exits(grid, player, threshold).fold(None, |best: Option<Exit>, exit| match best {
        Some(best) if best.score(tried, penalty) <= exit.score(tried, penalty) => Some(best),
        _ => Some(exit),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use tilescout_vision::{Tile, TileSignature};

    use super::*;

    /// 10x9 grid with unique signatures and the given dark tiles.
    pub(crate) fn grid_with_dark(dark: &[TilePos]) -> TileGrid {
        let (cols, rows) = (10, 9);
        let tiles = (0..rows)
            .flat_map(|row| (0..cols).map(move |col| TilePos::new(col, row)))
            .map(|pos| {
                let dark_ratio = if dark.contains(&pos) { 1.0 } else { 0.0 };
                Tile {
                    pos,
                    signature: sig_at(pos),
                    dark_ratio,
                    is_black: dark_ratio >= 0.95,
                }
            })
            .collect();
        TileGrid::from_tiles(cols, rows, tiles)
    }

    #[expect(clippy::cast_possible_wrap)]
    pub(crate) fn sig_at(pos: TilePos) -> TileSignature {
        TileSignature((pos.row * 100 + pos.col) as i64 + 1)
    }

    const PLAYER: TilePos = TilePos::new(4, 4);

    #[test]
    fn test_direction_towards() {
        assert_eq!(direction_towards(PLAYER, TilePos::new(0, 4)), Some(Direction::Left));
        assert_eq!(direction_towards(PLAYER, TilePos::new(9, 2)), Some(Direction::Right));
        assert_eq!(direction_towards(PLAYER, TilePos::new(5, 0)), Some(Direction::Up));
        assert_eq!(direction_towards(PLAYER, TilePos::new(4, 8)), Some(Direction::Down));
        assert_eq!(direction_towards(PLAYER, PLAYER), None);
    }

    #[test]
    fn test_only_dark_edge_tiles_are_exits() {
        let grid = grid_with_dark(&[TilePos::new(0, 4), TilePos::new(3, 3)]);
        let exits: Vec<_> = find_exits(&grid, PLAYER, 0.7).collect();
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].direction, Direction::Left);
        assert!((exits[0].distance - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_exit_wins() {
        let grid = grid_with_dark(&[TilePos::new(9, 4), TilePos::new(4, 8)]);
        let exit = best_exit(&grid, PLAYER, 0.7, DirectionSet::EMPTY, 4.0).unwrap();
        assert_eq!(exit.direction, Direction::Down);
    }

    #[test]
    fn test_penalty_prefers_untried_on_tie() {
        let grid = grid_with_dark(&[TilePos::new(0, 4), TilePos::new(4, 0)]);
        for tried in [Direction::Left, Direction::Up] {
            let tried_set = [tried].into_iter().collect();
            let exit = best_exit(&grid, PLAYER, 0.7, tried_set, 4.0).unwrap();
            assert_ne!(exit.direction, tried);
        }
    }
}
