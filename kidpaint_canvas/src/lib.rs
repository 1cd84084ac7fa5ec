// kidpaint_canvas — the shared pixel grid and local editing engine.
//
// This crate holds everything about canvas state that does not touch the
// network. The relay uses `Grid` for its canonical copy; clients wrap a
// `CanvasModel` and forward the edits it returns.
//
// Module overview:
// - `grid.rs`:      `Grid`, a dense W×H array of colors with bounds-checked
//                   access, last-write-wins edits, snapshot and diff helpers.
// - `fill.rs`:      Breadth-first 4-connected flood fill.
// - `history.rs`:   Bounded undo/redo stacks of full-grid snapshots.
// - `model.rs`:     `CanvasModel`: grid ownership, painting tools, history
//                   discipline, remote edit application.
// - `grid_file.rs`: JSON import/export of grids.
// - `config.rs`:    `CanvasConfig` (size, history depth).
// - `error.rs`:     `CanvasError` (file import/export only).
//
// Depends only on `kidpaint_protocol` for the `Color` and `PixelEdit` value
// types.

pub mod config;
pub mod error;
pub mod fill;
pub mod grid;
pub mod grid_file;
pub mod history;
pub mod model;

pub use config::CanvasConfig;
pub use error::CanvasError;
pub use grid::Grid;
pub use model::{CanvasModel, DEFAULT_COLOR, Tool};
