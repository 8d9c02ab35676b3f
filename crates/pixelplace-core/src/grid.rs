//! Dense reconstruction of a canvas.
//!
//! Storage only holds the cells someone has drawn. A [`DenseGrid`] turns that
//! sparse set into a total function over the coordinate space: it starts with
//! every coordinate set to the background and then overlays stored cells by
//! coordinate, so the order in which cells arrive does not matter.

use crate::bounds::CellCoord;
use crate::cell::Pixel;
use crate::color::Color;

/// `width x height` pixels in row-major order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseGrid {
    width: u32,
    height: u32,
    background: Color,
    cells: Vec<Pixel>,
    drawn: usize,
}

impl DenseGrid {
    /// Create a grid with every coordinate set to `background`
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for y in 0..i64::from(height) {
            for x in 0..i64::from(width) {
                cells.push(Pixel::background(CellCoord::new(x, y), background));
            }
        }

        Self {
            width,
            height,
            background,
            cells,
            drawn: 0,
        }
    }

    /// Place a stored pixel at its coordinate.
    ///
    /// Returns `false`, leaving the grid untouched, when the pixel lies
    /// outside the canvas.
    pub fn overlay(&mut self, pixel: Pixel) -> bool {
        let Some(index) = pixel.coord().index(self.width, self.height) else {
            return false;
        };

        if self.cells[index].is_background() {
            self.drawn += 1;
        }
        self.cells[index] = pixel;
        true
    }

    pub fn get(&self, x: i64, y: i64) -> Option<&Pixel> {
        CellCoord::new(x, y)
            .index(self.width, self.height)
            .map(|index| &self.cells[index])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn background(&self) -> Color {
        self.background
    }

    /// Total number of entries (`width * height`)
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of coordinates holding a drawn (non-background) pixel
    pub fn drawn_count(&self) -> usize {
        self.drawn
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.cells
    }

    pub fn into_pixels(self) -> Vec<Pixel> {
        self.cells
    }

    /// Iterate rows from top to bottom
    pub fn rows(&self) -> impl Iterator<Item = &[Pixel]> + '_ {
        self.cells.chunks(self.width.max(1) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn drawn(x: i64, y: i64, color: Color) -> Pixel {
        Pixel::drawn(CellCoord::new(x, y), color, "writer", Utc::now())
    }

    #[test]
    fn test_new_grid_is_all_background() {
        let grid = DenseGrid::new(3, 2, Color::WHITE);
        assert_eq!(grid.len(), 6);
        assert_eq!(grid.drawn_count(), 0);
        assert!(grid.pixels().iter().all(|p| p.color == "#FFFFFF" && p.is_background()));

        // Row-major layout
        let coords: Vec<_> = grid.pixels().iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(coords, vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
    }

    #[test]
    fn test_overlay_sets_coordinate() {
        let mut grid = DenseGrid::new(2, 2, Color::WHITE);
        assert!(grid.overlay(drawn(0, 0, Color::RED)));

        let rows: Vec<Vec<&str>> = grid
            .rows()
            .map(|row| row.iter().map(|p| p.color.as_str()).collect())
            .collect();
        assert_eq!(rows, vec![vec!["#FF0000", "#FFFFFF"], vec!["#FFFFFF", "#FFFFFF"]]);
        assert_eq!(grid.drawn_count(), 1);
    }

    #[test]
    fn test_overlay_rejects_out_of_bounds() {
        let mut grid = DenseGrid::new(2, 2, Color::WHITE);
        let before = grid.clone();

        assert!(!grid.overlay(drawn(2, 0, Color::BLACK)));
        assert!(!grid.overlay(drawn(0, 2, Color::BLACK)));
        assert!(!grid.overlay(drawn(-1, 0, Color::BLACK)));
        assert_eq!(grid, before);
    }

    #[test]
    fn test_overlay_order_does_not_matter() {
        let cells = vec![
            drawn(1, 1, Color::RED),
            drawn(0, 1, Color::BLACK),
            drawn(2, 0, Color::rgb(1, 2, 3)),
        ];

        let mut forward = DenseGrid::new(3, 2, Color::WHITE);
        for cell in cells.iter().cloned() {
            forward.overlay(cell);
        }
        let mut backward = DenseGrid::new(3, 2, Color::WHITE);
        for cell in cells.iter().rev().cloned() {
            backward.overlay(cell);
        }

        assert_eq!(forward, backward);
        assert_eq!(forward.drawn_count(), 3);
        assert_eq!(forward.get(2, 0).unwrap().color, "#010203");
        assert!(forward.get(3, 0).is_none());
    }

    #[test]
    fn test_overwrite_counts_once() {
        let mut grid = DenseGrid::new(1, 1, Color::WHITE);
        grid.overlay(drawn(0, 0, Color::RED));
        grid.overlay(drawn(0, 0, Color::BLACK));
        assert_eq!(grid.drawn_count(), 1);
        assert_eq!(grid.get(0, 0).unwrap().color, "#000000");
    }
}
