// Grid import/export as JSON.
//
// File layout:
//
//   {"width": W, "height": H, "cells": [[row 0 colors...], [row 1...], ...]}
//
// `cells` holds `height` rows of `width` signed ARGB integers each. Rows are
// nested so the file stays readable and hand-editable for small canvases.
// Every structural mismatch between the header and the rows is rejected on
// import; nothing is padded or truncated.

use std::fs;
use std::path::Path;

use kidpaint_protocol::Color;
use serde::{Deserialize, Serialize};

use crate::error::{CanvasError, Result};
use crate::grid::Grid;

#[derive(Serialize, Deserialize)]
struct GridFile {
    width: u32,
    height: u32,
    cells: Vec<Vec<Color>>,
}

/// Write `grid` to `path`, replacing any existing file.
pub fn export_grid(path: &Path, grid: &Grid) -> Result<()> {
    let width = grid.width() as usize;
    let rows = if width == 0 {
        vec![Vec::new(); grid.height() as usize]
    } else {
        grid.cells().chunks(width).map(<[Color]>::to_vec).collect()
    };
    let file = GridFile {
        width: grid.width(),
        height: grid.height(),
        cells: rows,
    };
    let json = serde_json::to_vec_pretty(&file).map_err(|source| CanvasError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| CanvasError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a grid from `path`.
pub fn import_grid(path: &Path) -> Result<Grid> {
    let bytes = fs::read(path).map_err(|source| CanvasError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: GridFile = serde_json::from_slice(&bytes).map_err(|source| CanvasError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let invalid = |reason: String| CanvasError::InvalidGrid {
        path: path.to_path_buf(),
        reason,
    };
    if file.cells.len() != file.height as usize {
        return Err(invalid(format!(
            "header says {} rows, found {}",
            file.height,
            file.cells.len()
        )));
    }
    if let Some((row, cells)) = file
        .cells
        .iter()
        .enumerate()
        .find(|(_, cells)| cells.len() != file.width as usize)
    {
        return Err(invalid(format!(
            "row {row} has {} cells, expected {}",
            cells.len(),
            file.width
        )));
    }

    let cells = file.cells.into_iter().flatten().collect();
    Grid::from_cells(file.width, file.height, cells)
        .ok_or_else(|| invalid("cell count does not match dimensions".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_then_import_restores_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picture.json");

        let mut grid = Grid::new(4, 3);
        grid.set(0, 0, Color(-543_230));
        grid.set(3, 2, Color(0x00FF_FFFF));
        export_grid(&path, &grid).unwrap();

        assert_eq!(import_grid(&path).unwrap(), grid);
    }

    #[test]
    fn file_stores_rows_of_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");

        let mut grid = Grid::new(2, 2);
        grid.set(1, 0, Color(5));
        export_grid(&path, &grid).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["cells"], serde_json::json!([[0, 5], [0, 0]]));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.json");
        fs::write(&path, r#"{"width":2,"height":2,"cells":[[1,2],[3]]}"#).unwrap();

        let err = import_grid(&path).unwrap_err();
        assert!(matches!(err, CanvasError::InvalidGrid { .. }), "{err}");
    }

    #[test]
    fn wrong_row_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.json");
        fs::write(&path, r#"{"width":1,"height":3,"cells":[[1]]}"#).unwrap();

        assert!(matches!(
            import_grid(&path),
            Err(CanvasError::InvalidGrid { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = import_grid(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, CanvasError::Io { .. }));
    }

    #[test]
    fn garbage_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(import_grid(&path), Err(CanvasError::Json { .. })));
    }
}
