use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel coordinate as received from a writer or read back from storage.
///
/// Signed on purpose: inbound commands and stored records may carry negative
/// values, which are rejected by [`in_bounds`] rather than by the type.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: i64,
    pub y: i64,
}

impl CellCoord {
    pub const fn new(x: i64, y: i64) -> Self {
        CellCoord { x, y }
    }

    /// Check if this coord lies on a `width x height` canvas
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        in_bounds(self.x, self.y, width, height)
    }

    /// Row-major offset into a dense grid, or `None` when out of bounds
    pub fn index(&self, width: u32, height: u32) -> Option<usize> {
        if !self.is_within(width, height) {
            return None;
        }
        Some(self.y as usize * width as usize + self.x as usize)
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// `true` iff `0 <= x < width` and `0 <= y < height`
pub fn in_bounds(x: i64, y: i64, width: u32, height: u32) -> bool {
    x >= 0 && y >= 0 && x < i64::from(width) && y < i64::from(height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_bounds_edges() {
        assert!(in_bounds(0, 0, 2, 2));
        assert!(in_bounds(1, 1, 2, 2));
        assert!(!in_bounds(2, 1, 2, 2));
        assert!(!in_bounds(1, 2, 2, 2));
        assert!(!in_bounds(-1, 0, 2, 2));
        assert!(!in_bounds(0, -1, 2, 2));
        assert!(!in_bounds(5, 5, 2, 2));
    }

    #[test]
    fn test_in_bounds_extremes() {
        assert!(!in_bounds(0, 0, 0, 0));
        assert!(!in_bounds(i64::MIN, 0, u32::MAX, u32::MAX));
        assert!(!in_bounds(i64::MAX, 0, u32::MAX, u32::MAX));
        assert!(in_bounds(i64::from(u32::MAX) - 1, 0, u32::MAX, 1));
    }

    #[test]
    fn test_index_row_major() {
        assert_eq!(CellCoord::new(0, 0).index(3, 2), Some(0));
        assert_eq!(CellCoord::new(2, 0).index(3, 2), Some(2));
        assert_eq!(CellCoord::new(0, 1).index(3, 2), Some(3));
        assert_eq!(CellCoord::new(2, 1).index(3, 2), Some(5));
        assert_eq!(CellCoord::new(3, 1).index(3, 2), None);
    }
}
