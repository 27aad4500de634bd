//! Error types for the grid layer.

/// Errors produced by board arithmetic.
///
/// Out-of-range input is always reported, never clamped. A caller that
/// passes cell 16 on a 4×4 board gets `OutOfBounds`, not cell 15.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// The cell index is not inside `[0, size²)`.
    #[error("cell {cell} is outside a {size}x{size} board")]
    OutOfBounds { cell: usize, size: usize },

    /// The requested board size is not supported.
    #[error("board size {0} is not supported (expected 2..=16)")]
    InvalidSize(usize),
}
