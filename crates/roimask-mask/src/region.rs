//! Closing painted outlines into filled regions.
//!
//! Two flood-fill passes over the 4-connected grid:
//!
//! 1. every unset border cell seeds a fill that marks the outside;
//! 2. every unset cell the first pass could not reach is enclosed by painted
//!    cells, so it is filled.
//!
//! Both passes use an explicit stack so large images cannot exhaust the call
//! stack.

use tracing::debug;

use crate::pixel_mask::PixelMask;

/// Returns a copy of `mask` with every enclosed region filled.
#[must_use = "returns the closed mask; the input is left untouched"]
pub fn close_enclosed_areas(mask: &PixelMask) -> PixelMask {
    let mut closed = mask.clone();
    close_enclosed_areas_in_place(&mut closed);
    closed
}

/// Fills every enclosed region of `mask` and returns the number of cells
/// that were set.
pub fn close_enclosed_areas_in_place(mask: &mut PixelMask) -> usize {
    let (width, height) = (mask.width() as usize, mask.height() as usize);
    if width == 0 || height == 0 {
        return 0;
    }

    let cells = mask.cells_mut();
    let mut visited = vec![false; cells.len()];
    let mut stack = Vec::new();

    let border = (0..width)
        .flat_map(|x| [x, (height - 1) * width + x])
        .chain((0..height).flat_map(|y| [y * width, y * width + width - 1]));
    for seed in border {
        if cells[seed] == 0 && !visited[seed] {
            visited[seed] = true;
            stack.push(seed);
            flood(cells, &mut visited, &mut stack, width, false);
        }
    }

    let mut filled = 0;
    for seed in 0..cells.len() {
        if cells[seed] == 0 && !visited[seed] {
            visited[seed] = true;
            stack.push(seed);
            filled += flood(cells, &mut visited, &mut stack, width, true);
        }
    }

    if filled > 0 {
        debug!("Closed enclosed regions: {} cells filled", filled);
    }
    filled
}

/// Drains `stack`, visiting unset neighbours. When `paint` is true each
/// visited cell is also set. Returns the number of cells popped.
fn flood(
    cells: &mut [u8],
    visited: &mut [bool],
    stack: &mut Vec<usize>,
    width: usize,
    paint: bool,
) -> usize {
    let len = cells.len();
    let mut count = 0;
    while let Some(idx) = stack.pop() {
        count += 1;
        if paint {
            cells[idx] = 1;
        }
        let x = idx % width;
        let neighbours = [
            (x > 0).then(|| idx - 1),
            (x + 1 < width).then(|| idx + 1),
            idx.checked_sub(width),
            Some(idx + width).filter(|n| *n < len),
        ];
        for next in neighbours.into_iter().flatten() {
            if cells[next] == 0 && !visited[next] {
                visited[next] = true;
                stack.push(next);
            }
        }
    }
    count
}
