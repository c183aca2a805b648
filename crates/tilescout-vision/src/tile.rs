use serde::{Deserialize, Serialize};

use crate::{
    frame::{PixelFrame, Region},
    signature::{self, ExtractionConfig, FrameSignature, TileSignature},
};

/// Column/row position of a tile in a [`TileGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub col: usize,
    pub row: usize,
}

impl TilePos {
    #[must_use]
    pub const fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }

    /// Returns the position shifted by `(dx, dy)`, or `None` if it would go negative.
    #[must_use]
    pub fn offset(self, dx: isize, dy: isize) -> Option<Self> {
        Some(Self {
            col: self.col.checked_add_signed(dx)?,
            row: self.row.checked_add_signed(dy)?,
        })
    }

    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn distance(self, other: Self) -> f32 {
        let dx = self.col.abs_diff(other.col) as f32;
        let dy = self.row.abs_diff(other.row) as f32;
        dx.hypot(dy)
    }
}

/// One cell of the screen grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    pub pos: TilePos,
    pub signature: TileSignature,
    /// Fraction of sampled pixels darker than the configured threshold.
    pub dark_ratio: f32,
    pub is_black: bool,
}

/// Fixed grid of tiles derived from one frame.
///
/// Recomputed every cycle and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    cols: usize,
    rows: usize,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Splits `frame` into square tiles and computes their signatures.
    ///
    /// Partial tiles at the right/bottom edge are dropped.
    #[must_use]
    pub fn extract(frame: &PixelFrame, config: &ExtractionConfig) -> Self {
        let size = config.tile_size.max(1);
        let cols = frame.width() / size;
        let rows = frame.height() / size;
        let mut tiles = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let region = Region::new(col * size, row * size, size, size);
                let dark_ratio =
                    frame.dark_ratio(region, config.tile_sample_stride, config.dark_threshold);
                tiles.push(Tile {
                    pos: TilePos::new(col, row),
                    signature: TileSignature(signature::region_signature(frame, region, config)),
                    dark_ratio,
                    is_black: dark_ratio >= config.black_tile_ratio,
                });
            }
        }
        Self { cols, rows, tiles }
    }

    /// Builds a grid directly from tiles in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if `tiles.len() != cols * rows`.
    #[must_use]
    pub fn from_tiles(cols: usize, rows: usize, tiles: Vec<Tile>) -> Self {
        assert_eq!(tiles.len(), cols * rows, "tile count must match grid size");
        Self { cols, rows, tiles }
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn get(&self, pos: TilePos) -> Option<&Tile> {
        (pos.col < self.cols && pos.row < self.rows).then(|| &self.tiles[pos.row * self.cols + pos.col])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.tiles.iter()
    }

    pub fn signatures(&self) -> impl Iterator<Item = TileSignature> + '_ {
        self.tiles.iter().map(|t| t.signature)
    }

    #[must_use]
    pub fn is_edge(&self, pos: TilePos) -> bool {
        pos.col == 0 || pos.row == 0 || pos.col + 1 == self.cols || pos.row + 1 == self.rows
    }

    /// Tiles on the outer ring of the grid.
    pub fn edge_tiles(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.tiles.iter().filter(|t| self.is_edge(t.pos))
    }
}

/// Everything extraction produces for one frame.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub grid: TileGrid,
    pub signature: FrameSignature,
}

impl FrameAnalysis {
    #[must_use]
    pub fn of(frame: &PixelFrame, config: &ExtractionConfig) -> Self {
        Self {
            grid: TileGrid::extract(frame, config),
            signature: signature::frame_signature(frame, config),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::frame::Rgb;

    use super::*;

    #[test]
    fn test_grid_dimensions_follow_tile_size() {
        let frame = PixelFrame::filled(160, 144, Rgb::WHITE);
        let coarse = TileGrid::extract(&frame, &ExtractionConfig::default());
        assert_eq!((coarse.cols(), coarse.rows()), (10, 9));

        let fine = TileGrid::extract(
            &frame,
            &ExtractionConfig {
                tile_size: 8,
                tile_sample_stride: 2,
                ..ExtractionConfig::default()
            },
        );
        assert_eq!((fine.cols(), fine.rows()), (20, 18));
    }

    #[test]
    fn test_black_tiles_flagged() {
        // Black top-left tile, white elsewhere
        let frame = PixelFrame::from_fn(160, 144, |x, y| {
            if x < 16 && y < 16 { Rgb::BLACK } else { Rgb::WHITE }
        });
        let grid = TileGrid::extract(&frame, &ExtractionConfig::default());
        let corner = grid.get(TilePos::new(0, 0)).unwrap();
        assert!(corner.is_black);
        assert!((corner.dark_ratio - 1.0).abs() < f32::EPSILON);
        let other = grid.get(TilePos::new(1, 0)).unwrap();
        assert!(!other.is_black);
        assert_ne!(corner.signature, other.signature);
    }

    #[test]
    fn test_uniform_frame_has_uniform_signatures() {
        let frame = PixelFrame::filled(160, 144, Rgb::new(90, 140, 90));
        let grid = TileGrid::extract(&frame, &ExtractionConfig::default());
        let first = grid.iter().next().unwrap().signature;
        assert!(grid.signatures().all(|s| s == first));
    }

    #[test]
    fn test_edges_and_offsets() {
        let frame = PixelFrame::filled(160, 144, Rgb::WHITE);
        let grid = TileGrid::extract(&frame, &ExtractionConfig::default());
        assert_eq!(grid.edge_tiles().count(), 2 * 10 + 2 * 7);
        assert!(grid.is_edge(TilePos::new(9, 4)));
        assert!(!grid.is_edge(TilePos::new(4, 4)));
        assert_eq!(TilePos::new(0, 3).offset(-1, 0), None);
        assert_eq!(TilePos::new(2, 3).offset(1, -1), Some(TilePos::new(3, 2)));
        assert!(grid.get(TilePos::new(10, 0)).is_none());
    }

    #[test]
    fn test_distance_is_euclidean() {
        assert!((TilePos::new(0, 0).distance(TilePos::new(3, 4)) - 5.0).abs() < f32::EPSILON);
    }
}
