use chrono::{DateTime, Utc};
use pixelplace_core::{Canvas, CanvasStatus, Pixel};

use super::StoreError;

/// Canvas row as stored; decoded into [`Canvas`] with [`TryFrom`]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CanvasRow {
    pub id: String,
    pub admin_id: String,
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl TryFrom<CanvasRow> for Canvas {
    type Error = StoreError;

    fn try_from(row: CanvasRow) -> Result<Self, Self::Error> {
        let dimension = |field: &'static str, value: i32| {
            u32::try_from(value)
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| {
                    StoreError::decode("canvas", field, format!("must be positive, got {value}"))
                })
        };

        if row.admin_id.is_empty() {
            return Err(StoreError::decode("canvas", "admin_id", "is empty"));
        }

        let status: CanvasStatus = row
            .status
            .parse()
            .map_err(|e| StoreError::decode("canvas", "status", e))?;

        Ok(Canvas {
            width: dimension("width", row.width)?,
            height: dimension("height", row.height)?,
            id: row.id,
            admin_id: row.admin_id,
            name: row.name,
            status,
            start_date: row.start_date,
            end_date: row.end_date,
        })
    }
}

/// Stored pixel row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PixelRow {
    pub x: i64,
    pub y: i64,
    pub color: String,
    pub author_id: String,
    pub updated_at: DateTime<Utc>,
}

impl From<PixelRow> for Pixel {
    fn from(row: PixelRow) -> Self {
        Pixel {
            x: row.x,
            y: row.y,
            color: row.color,
            author_id: Some(row.author_id),
            updated_at: row.updated_at,
        }
    }
}
