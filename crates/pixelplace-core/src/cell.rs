use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bounds::CellCoord;
use crate::color::Color;

/// One colored cell of a canvas.
///
/// `color` stays as the stored text so that a record read back from storage
/// can be carried around even when it was written by something other than
/// this crate; it is parsed only when rasterizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pixel {
    pub x: i64,
    pub y: i64,
    pub color: String,
    /// `None` for background cells nobody has drawn on
    pub author_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Pixel {
    /// A pixel drawn by `author_id` at `updated_at`
    pub fn drawn(
        coord: CellCoord,
        color: Color,
        author_id: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Pixel {
            x: coord.x,
            y: coord.y,
            color: color.to_hex(),
            author_id: Some(author_id.into()),
            updated_at,
        }
    }

    /// Placeholder for an undrawn coordinate: no author and the epoch as
    /// timestamp, so two reconstructions of the same canvas are identical.
    pub fn background(coord: CellCoord, color: Color) -> Self {
        Pixel {
            x: coord.x,
            y: coord.y,
            color: color.to_hex(),
            author_id: None,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn coord(&self) -> CellCoord {
        CellCoord::new(self.x, self.y)
    }

    pub fn is_background(&self) -> bool {
        self.author_id.is_none()
    }
}
