//! Tile grid used for walkability checks

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};

use super::Vec2;

/// Cells within this many tiles of the map centre are never walls in a generated arena
const SPAWN_CLEARANCE: usize = 2;

/// Kind of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Wall,
    Floor,
}

impl Cell {
    fn from_char(ch: char) -> Option<Self> {
        match ch {
            '#' => Some(Cell::Wall),
            '.' => Some(Cell::Floor),
            _ => None,
        }
    }
}

/// Fixed-size grid of cells with a uniform cell size.
///
/// Dimensions, cell size and contents never change after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMap {
    cols: usize,
    rows: usize,
    cell_size: f32,
    cells: Vec<Cell>,
}

impl TileMap {
    /// An arena with no walls at all
    pub fn open(cols: usize, rows: usize, cell_size: f32) -> Result<Self, TileMapError> {
        Self::from_cells(cols, rows, cell_size, vec![Cell::Floor; cols * rows])
    }

    /// Parse an ASCII layout: `#` is a wall, `.` is floor, one line per row.
    pub fn parse(layout: &str, cell_size: f32) -> Result<Self, TileMapError> {
        let mut cells = Vec::new();
        let mut cols = None;
        let mut rows = 0;

        for line in layout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let width = line.chars().count();
            match cols {
                None => cols = Some(width),
                Some(expected) if expected != width => {
                    return Err(TileMapError::RaggedRow {
                        row: rows,
                        expected,
                        found: width,
                    });
                }
                Some(_) => {}
            }

            for (col, ch) in line.chars().enumerate() {
                let cell = Cell::from_char(ch).ok_or(TileMapError::UnknownCell {
                    row: rows,
                    col,
                    ch,
                })?;
                cells.push(cell);
            }
            rows += 1;
        }

        let cols = cols.ok_or(TileMapError::Empty)?;
        Self::from_cells(cols, rows, cell_size, cells)
    }

    /// Read and parse a layout file
    pub fn load(path: impl AsRef<Path>, cell_size: f32) -> Result<Self, TileMapError> {
        let path = path.as_ref();
        let layout = std::fs::read_to_string(path).map_err(|source| TileMapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&layout, cell_size)
    }

    /// Seeded arena: random interior walls at `wall_density`, an optional solid
    /// border, and a clear area around the centre spawn point.
    pub fn generate(
        cols: usize,
        rows: usize,
        cell_size: f32,
        seed: u64,
        wall_density: f64,
        walled: bool,
    ) -> Result<Self, TileMapError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let density = if wall_density.is_finite() {
            wall_density.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let (center_col, center_row) = (cols / 2, rows / 2);

        let mut cells = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let border =
                    walled && (row == 0 || col == 0 || row + 1 == rows || col + 1 == cols);
                let near_spawn = col.abs_diff(center_col) <= SPAWN_CLEARANCE
                    && row.abs_diff(center_row) <= SPAWN_CLEARANCE;
                // Draw for every cell so the layout only depends on seed and size.
                let roll = rng.gen_bool(density);
                let cell = if border || (roll && !near_spawn) {
                    Cell::Wall
                } else {
                    Cell::Floor
                };
                cells.push(cell);
            }
        }

        Self::from_cells(cols, rows, cell_size, cells)
    }

    fn from_cells(
        cols: usize,
        rows: usize,
        cell_size: f32,
        cells: Vec<Cell>,
    ) -> Result<Self, TileMapError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(TileMapError::InvalidCellSize(cell_size));
        }
        if cols == 0 || rows == 0 {
            return Err(TileMapError::Empty);
        }
        debug_assert_eq!(cells.len(), cols * rows);

        Ok(Self {
            cols,
            rows,
            cell_size,
            cells,
        })
    }

    /// Whether the continuous scene coordinate lies on a floor cell.
    ///
    /// Anything outside the grid (negative, past the extent, or NaN) is not walkable.
    pub fn is_walkable(&self, x: f32, y: f32) -> bool {
        let (Some(col), Some(row)) = (self.axis_index(x, self.cols), self.axis_index(y, self.rows))
        else {
            return false;
        };
        self.cell_at(col, row) == Some(Cell::Floor)
    }

    fn axis_index(&self, coord: f32, len: usize) -> Option<usize> {
        let index = (coord / self.cell_size).floor();
        if index.is_finite() && index >= 0.0 && index < len as f32 {
            Some(index as usize)
        } else {
            None
        }
    }

    pub fn cell_at(&self, col: usize, row: usize) -> Option<Cell> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.cells.get(row * self.cols + col).copied()
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// World-space width of the grid
    pub fn width(&self) -> f32 {
        self.cols as f32 * self.cell_size
    }

    /// World-space height of the grid
    pub fn height(&self) -> f32 {
        self.rows as f32 * self.cell_size
    }

    /// Spawn point at the middle of the map
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width() / 2.0, self.height() / 2.0)
    }
}

/// Errors building a tile map
#[derive(Debug, thiserror::Error)]
pub enum TileMapError {
    #[error("map layout has no rows")]
    Empty,

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("unknown cell {ch:?} at row {row}, column {col}")]
    UnknownCell { row: usize, col: usize, ch: char },

    #[error("cell size must be positive, got {0}")]
    InvalidCellSize(f32),

    #[error("failed to read map file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: &str = "
        ####
        #..#
        #.##
        ####
    ";

    #[test]
    fn coordinates_outside_grid_are_not_walkable() {
        let tiles = TileMap::open(4, 3, 10.0).unwrap();
        assert!(!tiles.is_walkable(-0.1, 5.0));
        assert!(!tiles.is_walkable(5.0, -0.1));
        assert!(!tiles.is_walkable(40.0, 5.0));
        assert!(!tiles.is_walkable(5.0, 30.0));
        assert!(!tiles.is_walkable(f32::NAN, 5.0));
        assert!(!tiles.is_walkable(f32::INFINITY, 5.0));
        assert!(tiles.is_walkable(0.0, 0.0));
        assert!(tiles.is_walkable(39.99, 29.99));
    }

    #[test]
    fn walls_block_and_floor_allows() {
        let tiles = TileMap::parse(LAYOUT, 10.0).unwrap();
        assert_eq!((tiles.cols(), tiles.rows()), (4, 4));
        assert!(tiles.is_walkable(15.0, 15.0));
        assert!(tiles.is_walkable(25.0, 15.0));
        assert!(!tiles.is_walkable(25.0, 25.0));
        assert!(!tiles.is_walkable(5.0, 15.0));
        assert_eq!(tiles.cell_at(1, 2), Some(Cell::Floor));
        assert_eq!(tiles.cell_at(4, 0), None);
    }

    #[test]
    fn walkability_uses_floor_division() {
        let tiles = TileMap::parse(LAYOUT, 10.0).unwrap();
        // 19.999 is still in column 1, 20.0 starts column 2
        assert!(tiles.is_walkable(15.0, 19.999));
        assert!(tiles.is_walkable(19.999, 25.0));
        assert!(!tiles.is_walkable(20.0, 25.0));
    }

    #[test]
    fn parse_rejects_bad_layouts() {
        assert!(matches!(TileMap::parse("", 10.0), Err(TileMapError::Empty)));
        assert!(matches!(
            TileMap::parse("##\n#", 10.0),
            Err(TileMapError::RaggedRow {
                row: 1,
                expected: 2,
                found: 1
            })
        ));
        assert!(matches!(
            TileMap::parse("#x", 10.0),
            Err(TileMapError::UnknownCell { row: 0, col: 1, ch: 'x' })
        ));
        assert!(matches!(
            TileMap::parse("..", 0.0),
            Err(TileMapError::InvalidCellSize(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = TileMap::load("/definitely/not/here.map", 10.0).unwrap_err();
        assert!(matches!(err, TileMapError::Io { .. }));
    }

    #[test]
    fn generated_arena_is_deterministic_and_walled() {
        let a = TileMap::generate(20, 16, 50.0, 7, 0.3, true).unwrap();
        let b = TileMap::generate(20, 16, 50.0, 7, 0.3, true).unwrap();
        assert_eq!(a, b);

        for col in 0..a.cols() {
            assert_eq!(a.cell_at(col, 0), Some(Cell::Wall));
            assert_eq!(a.cell_at(col, a.rows() - 1), Some(Cell::Wall));
        }
        for row in 0..a.rows() {
            assert_eq!(a.cell_at(0, row), Some(Cell::Wall));
            assert_eq!(a.cell_at(a.cols() - 1, row), Some(Cell::Wall));
        }

        let center = a.center();
        assert!(a.is_walkable(center.x, center.y));
    }

    #[test]
    fn zero_density_leaves_interior_open() {
        let tiles = TileMap::generate(10, 10, 50.0, 3, 0.0, true).unwrap();
        for row in 1..9 {
            for col in 1..9 {
                assert_eq!(tiles.cell_at(col, row), Some(Cell::Floor));
            }
        }
    }

    #[test]
    fn unwalled_zero_density_arena_is_fully_open() {
        let tiles = TileMap::generate(10, 10, 50.0, 3, 0.0, false).unwrap();
        assert_eq!(tiles, TileMap::open(10, 10, 50.0).unwrap());
        assert!(tiles.is_walkable(0.0, 0.0));
        assert!(tiles.is_walkable(499.0, 499.0));
    }
}
