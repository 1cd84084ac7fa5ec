// Breadth-first flood fill.
//
// Recolors the maximal 4-connected region of cells equal to the start cell's
// color. A FIFO queue seeded with the start cell drives the fill; each
// dequeued cell is re-checked against the target color before it is painted,
// because a cell can be enqueued by several neighbours before any of them is
// processed. Neighbours are visited left, right, up, down.
//
// The returned edits are in fill order. That order is observable: the owner
// sends the edits to the relay in exactly this sequence, so peers see the
// fill spread outward from the start cell.

use std::collections::VecDeque;

use kidpaint_protocol::{Color, PixelEdit};

use crate::grid::Grid;

const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Fill the region containing `(column, row)` with `new_color`.
///
/// Returns the edits applied, in fill order. Out-of-bounds starts and fills
/// whose target already equals `new_color` return an empty list and leave
/// the grid untouched.
pub fn flood_fill(grid: &mut Grid, column: i32, row: i32, new_color: Color) -> Vec<PixelEdit> {
    let mut filled = Vec::new();
    let Some(target) = grid.get(column, row) else {
        return filled;
    };
    if target == new_color {
        return filled;
    }

    let mut queue = VecDeque::from([(column, row)]);
    while let Some((x, y)) = queue.pop_front() {
        if grid.get(x, y) != Some(target) {
            continue;
        }
        grid.set(x, y, new_color);
        filled.push(PixelEdit::new(x, y, new_color));

        for (dx, dy) in NEIGHBOR_OFFSETS {
            let (nx, ny) = (x + dx, y + dy);
            if grid.get(nx, ny) == Some(target) {
                queue.push_back((nx, ny));
            }
        }
    }
    filled
}
