// Dense 2D pixel grid.
//
// The grid is stored as a flat `Vec<Color>` indexed by
// `column + row * width`, giving O(1) read/write access. Out-of-bounds reads
// return `None`; out-of-bounds writes are no-ops that also return `None`, so
// callers can treat a bad coordinate as "nothing happened" without a
// separate bounds check.
//
// The same type backs the relay's canonical copy and every client's mirror.
// `painted_cells()` is how the relay turns its canonical state into the
// newcomer snapshot; `diff()` is how undo/redo and import find the cells a
// restore actually changed.
//
// See also: `fill.rs` for the flood fill over this grid, `history.rs` for
// the snapshot stacks, `model.rs` which owns the client-side `Grid`.

use kidpaint_protocol::{Color, PixelEdit};

/// Fixed-size grid of colors. Every cell always holds a valid color;
/// `Color::EMPTY` is the erased state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    /// Flat storage: index = column + row * width.
    cells: Vec<Color>,
    width: u32,
    height: u32,
}

impl Grid {
    /// Create a grid filled with `Color::EMPTY`.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Color::EMPTY)
    }

    /// Create a grid with every cell set to `color`.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        let total = (width as usize) * (height as usize);
        Self {
            cells: vec![color; total],
            width,
            height,
        }
    }

    /// Build a grid from row-major cells. Returns `None` if the cell count
    /// does not match the dimensions.
    pub fn from_cells(width: u32, height: u32, cells: Vec<Color>) -> Option<Self> {
        if cells.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            cells,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Check whether a coordinate is within bounds.
    pub fn in_bounds(&self, column: i32, row: i32) -> bool {
        column >= 0 && row >= 0 && (column as u32) < self.width && (row as u32) < self.height
    }

    /// Convert a coordinate to a flat index. Returns `None` if out of bounds.
    fn index(&self, column: i32, row: i32) -> Option<usize> {
        if self.in_bounds(column, row) {
            Some(column as usize + row as usize * self.width as usize)
        } else {
            None
        }
    }

    /// Read a cell. `None` for out-of-bounds coordinates.
    pub fn get(&self, column: i32, row: i32) -> Option<Color> {
        self.index(column, row).map(|i| self.cells[i])
    }

    /// Write a cell and return its previous color. `None` (and no write) for
    /// out-of-bounds coordinates.
    pub fn set(&mut self, column: i32, row: i32, color: Color) -> Option<Color> {
        let i = self.index(column, row)?;
        Some(std::mem::replace(&mut self.cells[i], color))
    }

    /// Apply an edit with last-write-wins semantics. Returns true if the
    /// cell's color changed; false if it already held that color or the edit
    /// is out of bounds.
    pub fn apply(&mut self, edit: &PixelEdit) -> bool {
        self.set(edit.column, edit.row, edit.color)
            .is_some_and(|previous| previous != edit.color)
    }

    /// Row-major view of the cells.
    pub fn cells(&self) -> &[Color] {
        &self.cells
    }

    /// Iterate every cell as a `PixelEdit`, row-major.
    pub fn iter_edits(&self) -> impl Iterator<Item = PixelEdit> + '_ {
        let width = self.width as usize;
        self.cells.iter().enumerate().map(move |(i, &color)| {
            PixelEdit::new((i % width) as i32, (i / width) as i32, color)
        })
    }

    /// Every non-empty cell as a `PixelEdit`, row-major. Replaying these on
    /// an empty grid of the same size reproduces this grid.
    pub fn painted_cells(&self) -> impl Iterator<Item = PixelEdit> + '_ {
        self.iter_edits().filter(|edit| !edit.color.is_empty())
    }

    /// The edits that turn `self` into `target`: one per cell whose color
    /// differs, carrying `target`'s color, row-major. Grids of different
    /// sizes have no meaningful diff and yield every cell of `target`.
    pub fn diff(&self, target: &Grid) -> Vec<PixelEdit> {
        if self.width != target.width || self.height != target.height {
            return target.iter_edits().collect();
        }
        target
            .iter_edits()
            .zip(self.cells.iter())
            .filter(|(edit, current)| edit.color != **current)
            .map(|(edit, _)| edit)
            .collect()
    }

    /// Number of cells holding `color`.
    pub fn count(&self, color: Color) -> usize {
        self.cells.iter().filter(|&&c| c == color).count()
    }
}
