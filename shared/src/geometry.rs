use crate::board::{Board, BoardLayout};
use crate::error::ClientError;

/// Per-cell spacing derived from a board layout.
///
/// Odd rows are shifted right by half a cell, giving the staggered grid the
/// hex edges are built on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridDelta {
    pub x_delta: f64,
    pub y_delta: f64,
}

impl GridDelta {
    pub fn for_layout(layout: &BoardLayout) -> Result<Self, ClientError> {
        layout.validate()?;
        Ok(Self {
            x_delta: layout.width / layout.column_count as f64,
            y_delta: layout.height / layout.row_count as f64,
        })
    }

    pub fn for_board(board: &Board) -> Result<Self, ClientError> {
        Self::for_layout(board.layout())
    }

    pub fn odd_row_offset(&self) -> f64 {
        self.x_delta / 2.0
    }

    /// Canvas-space center of the milepost at `(column, row)`.
    pub fn position(&self, layout: &BoardLayout, column: usize, row: usize) -> (f64, f64) {
        let mut x = column as f64 * self.x_delta + layout.left_offset;
        if row % 2 == 1 {
            x += self.odd_row_offset();
        }
        let y = row as f64 * self.y_delta + layout.top_offset;
        (x, y)
    }
}

/// One-shot position lookup for callers without a cached delta.
pub fn milepost_position(
    layout: &BoardLayout,
    column: usize,
    row: usize,
) -> Result<(f64, f64), ClientError> {
    Ok(GridDelta::for_layout(layout)?.position(layout, column, row))
}
