//! Board topology for Reaper's Whispers.
//!
//! The board is a square of `size × size` cells addressed by a single
//! row-major index: cell `0` is the top-left corner, cell `size - 1` the
//! top-right, cell `size² - 1` the bottom-right.
//!
//! ```text
//!  0  1  2  3
//!  4  5  6  7
//!  8  9 10 11
//! 12 13 14 15
//! ```
//!
//! Movement is orthogonal, one cell per step. Everything here is pure
//! arithmetic: no allocation beyond the returned neighbour list, no state.

mod error;

pub use error::GridError;

use serde::{Deserialize, Serialize};

/// A row-major cell index.
pub type Cell = usize;

/// Smallest supported board edge.
pub const MIN_SIZE: usize = 2;

/// Largest supported board edge.
pub const MAX_SIZE: usize = 16;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// The four orthogonal steps, in the fixed order used for tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// All directions in neighbour order: up, down, left, right.
    pub const ALL: [Direction; 4] =
        [Direction::Up, Direction::Down, Direction::Left, Direction::Right];
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// A square board of `size × size` cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    size: usize,
}

impl Grid {
    /// Creates a board with the given edge length.
    ///
    /// # Errors
    /// [`GridError::InvalidSize`] unless `MIN_SIZE <= size <= MAX_SIZE`.
    pub fn new(size: usize) -> Result<Self, GridError> {
        if !(MIN_SIZE..=MAX_SIZE).contains(&size) {
            return Err(GridError::InvalidSize(size));
        }
        Ok(Self { size })
    }

    /// Edge length of the board.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Total number of cells (`size²`).
    pub fn cell_count(&self) -> usize {
        self.size * self.size
    }

    /// Returns `true` if `cell` is on the board.
    pub fn contains(&self, cell: Cell) -> bool {
        cell < self.cell_count()
    }

    /// Iterates every cell index in row-major order.
    pub fn cells(&self) -> std::ops::Range<Cell> {
        0..self.cell_count()
    }

    /// Splits a cell index into `(row, col)`.
    pub fn row_col(&self, cell: Cell) -> Result<(usize, usize), GridError> {
        self.check(cell)?;
        Ok((cell / self.size, cell % self.size))
    }

    /// Joins `(row, col)` back into a cell index.
    pub fn index_of(&self, row: usize, col: usize) -> Result<Cell, GridError> {
        if row >= self.size || col >= self.size {
            return Err(GridError::OutOfBounds {
                cell: row.saturating_mul(self.size).saturating_add(col),
                size: self.size,
            });
        }
        Ok(row * self.size + col)
    }

    /// The cell one step from `cell` in `dir`, or `None` at an edge.
    pub fn step(&self, cell: Cell, dir: Direction) -> Result<Option<Cell>, GridError> {
        let (row, col) = self.row_col(cell)?;
        let last = self.size - 1;
        Ok(match dir {
            Direction::Up if row > 0 => Some(cell - self.size),
            Direction::Down if row < last => Some(cell + self.size),
            Direction::Left if col > 0 => Some(cell - 1),
            Direction::Right if col < last => Some(cell + 1),
            _ => None,
        })
    }

    /// Orthogonally adjacent cells of `cell`, in order up, down, left, right.
    ///
    /// Interior cells have four neighbours, edge cells three, corners two.
    /// The result never contains `cell` itself.
    pub fn neighbors(&self, cell: Cell) -> Result<Vec<Cell>, GridError> {
        let mut out = Vec::with_capacity(4);
        for dir in Direction::ALL {
            if let Some(next) = self.step(cell, dir)? {
                out.push(next);
            }
        }
        Ok(out)
    }

    /// Returns `true` iff `to` is one orthogonal step from `from`.
    ///
    /// # Errors
    /// [`GridError::OutOfBounds`] if either cell is off the board.
    pub fn is_valid_move(&self, from: Cell, to: Cell) -> Result<bool, GridError> {
        self.check(to)?;
        Ok(self.neighbors(from)?.contains(&to))
    }

    /// The four corner cells: top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self) -> [Cell; 4] {
        let last = self.size - 1;
        [0, last, last * self.size, self.cell_count() - 1]
    }

    fn check(&self, cell: Cell) -> Result<(), GridError> {
        if self.contains(cell) {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                cell,
                size: self.size,
            })
        }
    }
}

impl Default for Grid {
    /// The classic 4×4 board.
    fn default() -> Self {
        Self { size: 4 }
    }
}
