pub mod bounds;
pub mod canvas;
pub mod cell;
pub mod color;
pub mod cooldown;
pub mod error;
pub mod grid;
pub mod raster;

pub use bounds::{in_bounds, CellCoord};
pub use canvas::{Canvas, CanvasStatus, UnknownStatus};
pub use cell::Pixel;
pub use color::{Color, DEFAULT_BACKGROUND};
pub use cooldown::{Cooldown, CooldownDecision, DEFAULT_DRAW_COOLDOWN, DRAWING};
pub use error::{ColorError, RasterError};
pub use grid::DenseGrid;
pub use raster::{Rasterizer, DEFAULT_MAX_DIMENSION};
