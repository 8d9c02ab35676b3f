//! PNG rendering of a dense grid.

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

use crate::color::Color;
use crate::error::RasterError;
use crate::grid::DenseGrid;

/// Side length the published snapshot is scaled to by default
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Turns a [`DenseGrid`] into PNG bytes, one source pixel per cell, then
/// rescales so the larger side equals `max_dimension`.
///
/// Canvases larger than `max_dimension` are always shrunk. Smaller canvases
/// are only enlarged when `upscale` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rasterizer {
    max_dimension: u32,
    upscale: bool,
}

impl Rasterizer {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            upscale: false,
        }
    }

    pub fn with_upscale(mut self, upscale: bool) -> Self {
        self.upscale = upscale;
        self
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Output size for a `width x height` canvas, aspect ratio preserved
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        let larger = width.max(height);
        let needs_scaling =
            larger > self.max_dimension || (self.upscale && larger < self.max_dimension);
        if larger == 0 || !needs_scaling {
            return (width, height);
        }

        let scale = f64::from(self.max_dimension) / f64::from(larger);
        let side = |len: u32| {
            if len == larger {
                self.max_dimension
            } else {
                ((f64::from(len) * scale).round() as u32).max(1)
            }
        };
        (side(width), side(height))
    }

    /// Render the grid at its native size. Any unparsable color aborts.
    pub fn render(&self, grid: &DenseGrid) -> Result<RgbImage, RasterError> {
        let (width, height) = (grid.width(), grid.height());
        if width == 0 || height == 0 {
            return Err(RasterError::EmptyCanvas { width, height });
        }

        let mut img = RgbImage::new(width, height);
        for (index, pixel) in grid.pixels().iter().enumerate() {
            let color = Color::from_hex(&pixel.color).map_err(|source| RasterError::InvalidColor {
                x: pixel.x,
                y: pixel.y,
                source,
            })?;
            let x = (index % width as usize) as u32;
            let y = (index / width as usize) as u32;
            img.put_pixel(x, y, Rgb(color.channels()));
        }

        Ok(img)
    }

    /// Render, rescale and PNG-encode the grid
    pub fn encode(&self, grid: &DenseGrid) -> Result<Vec<u8>, RasterError> {
        let img = self.render(grid)?;

        let (target_w, target_h) = self.target_size(img.width(), img.height());
        let img = if (target_w, target_h) == img.dimensions() {
            img
        } else {
            imageops::resize(&img, target_w, target_h, FilterType::Triangle)
        };

        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION).with_upscale(true)
    }
}
