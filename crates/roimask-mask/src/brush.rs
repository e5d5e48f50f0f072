//! Circular brush stamping and gap-free stroke interpolation.

use roimask_types::{config::BrushConfig, geometry::Point};

use crate::pixel_mask::PixelMask;

/// Brush radius kept inside the configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrushRadius {
    value: u32,
    min: u32,
    max: u32,
}

impl BrushRadius {
    pub const DEFAULT: u32 = 10;

    pub fn from_config(config: &BrushConfig) -> Self {
        let mut radius = Self {
            value: config.default_radius,
            min: config.min_radius,
            max: config.max_radius.max(config.min_radius),
        };
        radius.set(config.default_radius);
        radius
    }

    pub fn get(&self) -> u32 {
        self.value
    }

    /// Stores `value` clamped into the allowed range and returns the result.
    pub fn set(&mut self, value: u32) -> u32 {
        self.value = value.clamp(self.min, self.max);
        self.value
    }
}

impl Default for BrushRadius {
    fn default() -> Self {
        Self::from_config(&BrushConfig::default())
    }
}

/// Clipped bounding box of the disc, or `None` when it misses the mask.
fn disc_bounds(mask: &PixelMask, cx: i32, cy: i32, radius: u32) -> Option<(i64, i64, i64, i64)> {
    let (w, h) = (i64::from(mask.width()), i64::from(mask.height()));
    if w == 0 || h == 0 {
        return None;
    }
    let r = i64::from(radius);
    let (cx, cy) = (i64::from(cx), i64::from(cy));
    let x0 = (cx - r).max(0);
    let x1 = (cx + r).min(w - 1);
    let y0 = (cy - r).max(0);
    let y1 = (cy + r).min(h - 1);
    if x0 > x1 || y0 > y1 {
        return None;
    }
    Some((x0, x1, y0, y1))
}

/// Sets every cell within `radius` (Euclidean) of the centre. Returns the
/// number of cells that changed from 0 to 1.
pub fn stamp_circle(mask: &mut PixelMask, cx: i32, cy: i32, radius: u32) -> usize {
    let Some((x0, x1, y0, y1)) = disc_bounds(mask, cx, cy, radius) else {
        return 0;
    };
    let r2 = i64::from(radius) * i64::from(radius);
    let width = mask.width() as usize;
    let cells = mask.cells_mut();
    let mut changed = 0;
    for y in y0..=y1 {
        let dy = y - i64::from(cy);
        for x in x0..=x1 {
            let dx = x - i64::from(cx);
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let idx = y as usize * width + x as usize;
            if cells[idx] == 0 {
                cells[idx] = 1;
                changed += 1;
            }
        }
    }
    changed
}

/// Whether any set cell lies inside the disc a stamp at `at` would cover.
pub fn touches_painted(mask: &PixelMask, at: Point, radius: u32) -> bool {
    let Some((x0, x1, y0, y1)) = disc_bounds(mask, at.x, at.y, radius) else {
        return false;
    };
    let r2 = i64::from(radius) * i64::from(radius);
    let width = mask.width() as usize;
    let cells = mask.cells();
    (y0..=y1).any(|y| {
        let dy = y - i64::from(at.y);
        (x0..=x1).any(|x| {
            let dx = x - i64::from(at.x);
            dx * dx + dy * dy <= r2 && cells[y as usize * width + x as usize] != 0
        })
    })
}

/// Drawing may start anywhere on a blank mask; otherwise the brush must
/// overlap material that is already painted.
pub fn can_begin_stroke(mask: &PixelMask, at: Point, radius: u32) -> bool {
    mask.is_blank() || touches_painted(mask, at, radius)
}

/// Part of `from -> to` whose stamps can reach the mask, found by clipping
/// against the mask bounds grown by `radius` on every side.
fn clip_segment(mask: &PixelMask, from: Point, to: Point, radius: u32) -> Option<(Point, Point)> {
    if mask.has_zero_area() {
        return None;
    }
    let r = f64::from(radius);
    let (x_min, y_min) = (-r, -r);
    let x_max = f64::from(mask.width()) - 1.0 + r;
    let y_max = f64::from(mask.height()) - 1.0 + r;
    let (x0, y0) = (f64::from(from.x), f64::from(from.y));
    let dx = f64::from(to.x) - x0;
    let dy = f64::from(to.y) - y0;

    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [
        (-dx, x0 - x_min),
        (dx, x_max - x0),
        (-dy, y0 - y_min),
        (dy, y_max - y0),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            if t > t1 {
                return None;
            }
            t0 = t0.max(t);
        } else {
            if t < t0 {
                return None;
            }
            t1 = t1.min(t);
        }
    }

    let at = |t: f64| Point::new((x0 + dx * t).round() as i32, (y0 + dy * t).round() as i32);
    Some((at(t0), at(t1)))
}

/// Stamps along the segment `from -> to`, one stamp per step where the step
/// count is `max(|dx|, |dy|)`, so consecutive stamps never leave a gap.
/// Portions too far outside the mask to paint anything are skipped.
pub fn stroke_to(mask: &mut PixelMask, from: Point, to: Point, radius: u32) -> usize {
    let Some((from, to)) = clip_segment(mask, from, to, radius) else {
        return 0;
    };
    let dx = i64::from(to.x) - i64::from(from.x);
    let dy = i64::from(to.y) - i64::from(from.y);
    let steps = dx.abs().max(dy.abs());
    if steps == 0 {
        return stamp_circle(mask, from.x, from.y, radius);
    }

    let mut changed = 0;
    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        let x = (f64::from(from.x) + dx as f64 * t).round() as i32;
        let y = (f64::from(from.y) + dy as f64 * t).round() as i32;
        changed += stamp_circle(mask, x, y, radius);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamping_twice_is_idempotent() {
        let mut once = PixelMask::new(40, 40);
        stamp_circle(&mut once, 20, 20, 7);
        let mut twice = once.clone();
        let changed = stamp_circle(&mut twice, 20, 20, 7);
        assert_eq!(changed, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn stamp_covers_euclidean_disc_only() {
        let mut mask = PixelMask::new(21, 21);
        stamp_circle(&mut mask, 10, 10, 3);
        assert!(mask.get(10, 10));
        assert!(mask.get(13, 10));
        assert!(mask.get(10, 7));
        assert!(mask.get(12, 12));
        assert!(!mask.get(13, 13));
        assert!(!mask.get(14, 10));
    }

    #[test]
    fn stamps_never_write_outside_bounds() {
        let centres = [(-30, -30), (-3, 5), (0, 0), (9, 4), (12, 2), (40, 40), (5, -2)];
        for radius in [0, 1, 4, 15, 50] {
            for (cx, cy) in centres {
                let mut mask = PixelMask::new(10, 5);
                let changed = stamp_circle(&mut mask, cx, cy, radius);
                assert_eq!(changed, mask.count_set());
                assert!(mask.count_set() <= 50);
                assert_eq!(mask.cells().len(), 50);
            }
        }
    }

    #[test]
    fn edge_straddling_stamp_is_clipped() {
        let mut mask = PixelMask::new(10, 10);
        stamp_circle(&mut mask, 0, 0, 2);
        assert!(mask.get(0, 0));
        assert!(mask.get(2, 0));
        assert!(mask.get(1, 1));
        assert!(!mask.get(2, 2));
    }

    #[test]
    fn zero_sized_mask_ignores_stamps() {
        let mut mask = PixelMask::new(0, 0);
        assert_eq!(stamp_circle(&mut mask, 0, 0, 10), 0);
        assert_eq!(
            stroke_to(&mut mask, Point::new(0, 0), Point::new(5, 5), 3),
            0
        );
    }

    #[test]
    fn fast_strokes_leave_no_gaps() {
        let mut mask = PixelMask::new(100, 20);
        stroke_to(&mut mask, Point::new(2, 10), Point::new(97, 10), 1);
        for x in 2..=97 {
            assert!(mask.get(x, 10), "gap at x={x}");
        }
        assert!(!mask.get(0, 10));
        assert!(!mask.get(99, 10));
    }

    #[test]
    fn diagonal_stroke_is_connected() {
        let mut mask = PixelMask::new(50, 50);
        stroke_to(&mut mask, Point::new(5, 40), Point::new(40, 5), 0);
        for step in 0..=35 {
            assert!(mask.get(5 + step, 40 - step));
        }
        assert_eq!(mask.count_set(), 36);
    }

    #[test]
    fn extreme_endpoints_are_clipped_to_the_mask() {
        let mut mask = PixelMask::new(20, 10);
        let changed = stroke_to(&mut mask, Point::new(i32::MIN, 5), Point::new(i32::MAX, 5), 1);
        assert_eq!(changed, mask.count_set());
        for x in 0..20 {
            assert!(mask.get(x, 5), "gap at x={x}");
        }
        assert!(!mask.get(0, 3));

        let mut outside = PixelMask::new(20, 10);
        let missed = stroke_to(
            &mut outside,
            Point::new(i32::MIN, -100),
            Point::new(i32::MAX, i32::MIN),
            3,
        );
        assert_eq!(missed, 0);
        assert!(outside.is_blank());
    }

    #[test]
    fn stroke_entering_from_outside_reaches_the_edge() {
        let mut mask = PixelMask::new(10, 10);
        stroke_to(&mut mask, Point::new(-1_000_000, -1_000_000), Point::new(5, 5), 0);
        for i in 0..=5 {
            assert!(mask.get(i, i), "gap at {i}");
        }
        assert_eq!(mask.count_set(), 6);
    }

    #[test]
    fn stroke_to_same_point_stamps_once() {
        let mut a = PixelMask::new(20, 20);
        let mut b = PixelMask::new(20, 20);
        stroke_to(&mut a, Point::new(10, 10), Point::new(10, 10), 4);
        stamp_circle(&mut b, 10, 10, 4);
        assert_eq!(a, b);
    }

    #[test]
    fn gating_allows_blank_masks_and_nearby_starts() {
        let mut mask = PixelMask::new(60, 60);
        assert!(can_begin_stroke(&mask, Point::new(50, 50), 5));

        stamp_circle(&mut mask, 10, 10, 2);
        assert!(can_begin_stroke(&mask, Point::new(16, 10), 5));
        assert!(!can_begin_stroke(&mask, Point::new(18, 10), 5));
        assert!(!can_begin_stroke(&mask, Point::new(50, 50), 5));
        assert!(!touches_painted(&mask, Point::new(-100, -100), 5));
    }

    #[test]
    fn radius_is_clamped_to_bounds() {
        let mut radius = BrushRadius::default();
        assert_eq!(radius.get(), BrushRadius::DEFAULT);
        assert_eq!(radius.set(0), 1);
        assert_eq!(radius.set(99), 50);
        assert_eq!(radius.set(25), 25);
    }
}
