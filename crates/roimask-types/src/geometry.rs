use serde::{Deserialize, Serialize};

/// Pointer sample in mask coordinates. May lie outside the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Pointer held down: the latest sample and the radius the stroke began with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stroke {
    last: Point,
    pub brush_radius: u32,
}

impl Stroke {
    pub fn begin(start: Point, brush_radius: u32) -> Self {
        Self {
            last: start,
            brush_radius,
        }
    }

    /// Moves to `point` and returns the previous sample.
    pub fn advance(&mut self, point: Point) -> Point {
        std::mem::replace(&mut self.last, point)
    }

    pub fn last(&self) -> Point {
        self.last
    }
}
