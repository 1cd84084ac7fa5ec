// Client-side canvas model.
//
// `CanvasModel` exclusively owns the client's mirror of the shared grid, the
// undo/redo history, and the painting tool state. Nothing outside this type
// holds a mutable handle to the grid: renderers read through `grid()` and
// `cell_color()`, and every write goes through one of the methods below.
//
// Two kinds of mutation reach the grid:
// - **Local** (`paint`, `set_cell_color`, `flood_fill`, `undo`, `redo`,
//   `import_grid`): return the `PixelEdit`s the owner must send to the relay,
//   in send order. Local mutations that change the grid record a history
//   checkpoint first; ones that would change nothing return no edits and
//   record nothing.
// - **Remote** (`apply_remote_edit`): applied last-write-wins, never recorded
//   in history and never re-sent.
//
// Undo/redo restore a whole snapshot. Because remote edits are not in the
// history, a restore can differ from what peers see; `undo`/`redo` therefore
// return the edits for every cell the restore changed so the owner can
// re-broadcast them and bring peers and the relay back in line.
//
// See also: `kidpaint_relay::collab::CollaborativeCanvas`, which pairs this
// model with a network session and forwards the returned edits.

use std::path::Path;

use kidpaint_protocol::{Color, PixelEdit};
use tracing::debug;

use crate::config::CanvasConfig;
use crate::error::{CanvasError, Result};
use crate::fill;
use crate::grid::Grid;
use crate::grid_file;
use crate::history::History;

/// Selected color of a fresh model (opaque orange).
pub const DEFAULT_COLOR: Color = Color(-543_230);

/// Painting tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tool {
    /// Paint single cells with the selected color.
    #[default]
    Pen,
    /// Flood-fill a region with the selected color.
    Bucket,
    /// Reset single cells to `Color::EMPTY`.
    Eraser,
}

pub struct CanvasModel {
    grid: Grid,
    history: History,
    selected_color: Color,
    tool: Tool,
}

impl CanvasModel {
    /// Create a model with an empty grid of the configured size.
    pub fn new(config: &CanvasConfig) -> Self {
        Self::with_grid(
            Grid::new(config.width, config.height),
            config.history_limit,
        )
    }

    /// Create a model around an existing grid.
    pub fn with_grid(grid: Grid, history_limit: usize) -> Self {
        Self {
            grid,
            history: History::new(history_limit),
            selected_color: DEFAULT_COLOR,
            tool: Tool::default(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn cell_color(&self, column: i32, row: i32) -> Option<Color> {
        self.grid.get(column, row)
    }

    pub fn selected_color(&self) -> Color {
        self.selected_color
    }

    pub fn select_color(&mut self, color: Color) {
        self.selected_color = color;
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    /// Apply the current tool at a cell.
    pub fn paint(&mut self, column: i32, row: i32) -> Vec<PixelEdit> {
        match self.tool {
            Tool::Pen => self
                .set_cell_color(column, row, self.selected_color)
                .into_iter()
                .collect(),
            Tool::Eraser => self
                .set_cell_color(column, row, Color::EMPTY)
                .into_iter()
                .collect(),
            Tool::Bucket => self.flood_fill(column, row, self.selected_color),
        }
    }

    /// Set one cell as a local mutation. Returns the edit to send, or `None`
    /// if the coordinate is out of bounds or the cell already has `color`.
    pub fn set_cell_color(&mut self, column: i32, row: i32, color: Color) -> Option<PixelEdit> {
        if self.grid.get(column, row)? == color {
            return None;
        }
        self.record_checkpoint();
        self.grid.set(column, row, color);
        Some(PixelEdit::new(column, row, color))
    }

    /// Flood-fill the region at `(column, row)` with `color`. Returns the
    /// edits in fill order; empty for out-of-bounds starts and same-color
    /// fills.
    pub fn flood_fill(&mut self, column: i32, row: i32, color: Color) -> Vec<PixelEdit> {
        match self.grid.get(column, row) {
            Some(target) if target != color => {}
            _ => return Vec::new(),
        }
        self.record_checkpoint();
        let edits = fill::flood_fill(&mut self.grid, column, row, color);
        debug!(column, row, %color, cells = edits.len(), "flood fill");
        edits
    }

    /// Snapshot the grid onto the undo stack and clear the redo stack.
    pub fn record_checkpoint(&mut self) {
        self.history.record(&self.grid);
    }

    /// Restore the previous snapshot. Returns `None` if there is nothing to
    /// undo, otherwise the edits for every cell the restore changed.
    pub fn undo(&mut self) -> Option<Vec<PixelEdit>> {
        let before = self.grid.clone();
        if !self.history.undo(&mut self.grid) {
            return None;
        }
        Some(before.diff(&self.grid))
    }

    /// Inverse of `undo`.
    pub fn redo(&mut self) -> Option<Vec<PixelEdit>> {
        let before = self.grid.clone();
        if !self.history.redo(&mut self.grid) {
            return None;
        }
        Some(before.diff(&self.grid))
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Apply an edit that arrived from the relay. Out-of-bounds edits are
    /// ignored. Returns true if the cell changed.
    pub fn apply_remote_edit(&mut self, edit: &PixelEdit) -> bool {
        self.grid.apply(edit)
    }

    /// Replace the whole grid as a local mutation. The new grid must have the
    /// model's dimensions. Returns the edits for every changed cell.
    pub fn replace_grid(&mut self, grid: Grid) -> Result<Vec<PixelEdit>> {
        if grid.width() != self.grid.width() || grid.height() != self.grid.height() {
            return Err(CanvasError::SizeMismatch {
                width: self.grid.width(),
                height: self.grid.height(),
                found_width: grid.width(),
                found_height: grid.height(),
            });
        }
        let edits = self.grid.diff(&grid);
        if !edits.is_empty() {
            self.record_checkpoint();
            self.grid = grid;
        }
        Ok(edits)
    }

    /// Load a grid file and make it the current picture (see
    /// `replace_grid`).
    pub fn import_grid(&mut self, path: &Path) -> Result<Vec<PixelEdit>> {
        let grid = grid_file::import_grid(path)?;
        self.replace_grid(grid)
    }

    /// Save the current local grid.
    pub fn export_grid(&self, path: &Path) -> Result<()> {
        grid_file::export_grid(path, &self.grid)
    }
}
