use thiserror::Error;

/// Errors raised while parsing `#RRGGBB` color text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorError {
    #[error("color must start with '#': {0:?}")]
    MissingHash(String),

    #[error("color must have exactly 6 hex digits: {0:?}")]
    InvalidLength(String),

    #[error("color contains non-hex digits: {0:?}")]
    InvalidDigit(String),
}

/// Errors raised while turning a dense grid into an image
#[derive(Error, Debug)]
pub enum RasterError {
    #[error("invalid color at ({x}, {y}): {source}")]
    InvalidColor {
        x: i64,
        y: i64,
        #[source]
        source: ColorError,
    },

    #[error("canvas has no pixels ({width}x{height})")]
    EmptyCanvas { width: u32, height: u32 },

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}
