/// An axis-aligned rectangle in the pixel space of the frame it came from.
///
/// Detectors produce these for faces; the image utilities consume them as
/// crop areas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a region from its left/top and exclusive right/bottom edges.
    ///
    /// Extents too large for `i32` saturate; such regions never fit a frame.
    pub fn from_corners(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right.saturating_sub(left), bottom.saturating_sub(top))
    }

    /// Exclusive right edge, widened so it cannot overflow.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Exclusive bottom edge, widened so it cannot overflow.
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn area(&self) -> i64 {
        if self.width <= 0 || self.height <= 0 {
            return 0;
        }
        self.width as i64 * self.height as i64
    }

    /// True when the region is non-degenerate and lies fully inside a
    /// `width x height` frame, i.e. `0 <= left < right <= width` and
    /// `0 <= top < bottom <= height`.
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.width > 0
            && self.height > 0
            && self.right() <= width as i64
            && self.bottom() <= height as i64
    }

    /// Intersects the region with a `width x height` frame.
    ///
    /// Returns `None` when nothing of the region remains inside the frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Region> {
        let max_x = i32::try_from(width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height).unwrap_or(i32::MAX);
        let left = self.x.clamp(0, max_x);
        let top = self.y.clamp(0, max_y);
        let right = self.x.saturating_add(self.width).clamp(0, max_x);
        let bottom = self.y.saturating_add(self.height).clamp(0, max_y);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Region::from_corners(left, top, right, bottom))
    }
}
