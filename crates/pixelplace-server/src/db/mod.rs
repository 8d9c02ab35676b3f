pub mod memory;
pub mod models;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use pixelplace_core::{Canvas, CanvasStatus, CellCoord, Pixel};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

pub use memory::MemoryStore;
use models::{CanvasRow, PixelRow};

/// Failures of the document store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Malformed {document} document: `{field}` {reason}")]
    Decode {
        document: &'static str,
        field: &'static str,
        reason: String,
    },

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Failures worth retrying: the call may succeed if repeated
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Timeout(_) | StoreError::Unavailable(_) => true,
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Protocol(_)
            ),
            StoreError::Decode { .. } => false,
        }
    }

    pub fn decode(document: &'static str, field: &'static str, reason: impl ToString) -> Self {
        StoreError::Decode {
            document,
            field,
            reason: reason.to_string(),
        }
    }
}

/// Pixels of one canvas in row-major order
pub type PixelStream<'a> = BoxStream<'a, Result<Pixel, StoreError>>;

/// Document store holding canvases, their pixels and per-writer cooldowns.
///
/// Every write is a single-document overwrite; nothing here spans documents.
#[async_trait]
pub trait CanvasStore: Send + Sync {
    async fn get_canvas(&self, canvas_id: &str) -> Result<Option<Canvas>, StoreError>;

    /// Create or replace a canvas document
    async fn put_canvas(&self, canvas: &Canvas) -> Result<(), StoreError>;

    /// Returns `false` when the canvas does not exist
    async fn set_canvas_status(
        &self,
        canvas_id: &str,
        status: CanvasStatus,
    ) -> Result<bool, StoreError>;

    /// Upsert the pixel at its coordinate (last writer wins)
    async fn put_pixel(&self, canvas_id: &str, pixel: &Pixel) -> Result<(), StoreError>;

    /// Lazily scan the pixels with `0 <= x < width` and `0 <= y < height`,
    /// ordered by `y` then `x`, starting strictly after `after` when given.
    fn scan_pixels<'a>(
        &'a self,
        canvas_id: &'a str,
        width: u32,
        height: u32,
        after: Option<CellCoord>,
    ) -> PixelStream<'a>;

    /// Delete every pixel of a canvas, returning how many were removed
    async fn delete_pixels(&self, canvas_id: &str) -> Result<u64, StoreError>;

    /// Timestamp of the writer's last accepted action in `category`
    async fn last_action(
        &self,
        category: &str,
        writer_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn record_action(
        &self,
        category: &str,
        writer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    page_size: u32,
}

struct ScanCursor {
    after: Option<(i64, i64)>,
    done: bool,
}

impl Database {
    /// Connect to the database
    pub async fn connect(database_url: &str, page_size: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Self {
            pool,
            page_size: page_size.max(1),
        })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CanvasStore for Database {
    async fn get_canvas(&self, canvas_id: &str) -> Result<Option<Canvas>, StoreError> {
        let row = sqlx::query_as::<_, CanvasRow>(
            r#"SELECT id, admin_id, name, width, height, status, start_date, end_date
               FROM canvases WHERE id = $1"#,
        )
        .bind(canvas_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Canvas::try_from).transpose()
    }

    async fn put_canvas(&self, canvas: &Canvas) -> Result<(), StoreError> {
        let width = i32::try_from(canvas.width)
            .map_err(|_| StoreError::decode("canvas", "width", "does not fit in INTEGER"))?;
        let height = i32::try_from(canvas.height)
            .map_err(|_| StoreError::decode("canvas", "height", "does not fit in INTEGER"))?;

        sqlx::query(
            r#"
            INSERT INTO canvases (id, admin_id, name, width, height, status, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id)
            DO UPDATE SET admin_id = $2, name = $3, width = $4, height = $5,
                          status = $6, start_date = $7, end_date = $8
            "#,
        )
        .bind(&canvas.id)
        .bind(&canvas.admin_id)
        .bind(&canvas.name)
        .bind(width)
        .bind(height)
        .bind(canvas.status.as_str())
        .bind(canvas.start_date)
        .bind(canvas.end_date)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_canvas_status(
        &self,
        canvas_id: &str,
        status: CanvasStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE canvases SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(canvas_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn put_pixel(&self, canvas_id: &str, pixel: &Pixel) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pixels (canvas_id, x, y, color, author_id, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (canvas_id, x, y)
            DO UPDATE SET color = $4, author_id = $5, updated_at = $6
            "#,
        )
        .bind(canvas_id)
        .bind(pixel.x)
        .bind(pixel.y)
        .bind(&pixel.color)
        .bind(pixel.author_id.as_deref().unwrap_or_default())
        .bind(pixel.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn scan_pixels<'a>(
        &'a self,
        canvas_id: &'a str,
        width: u32,
        height: u32,
        after: Option<CellCoord>,
    ) -> PixelStream<'a> {
        let page_size = i64::from(self.page_size);
        let cursor = ScanCursor {
            after: after.map(|c| (c.y, c.x)),
            done: false,
        };

        // Keyset pagination on (y, x): each page resumes after the last row seen
        stream::try_unfold(cursor, move |cursor| async move {
            if cursor.done {
                return Ok(None);
            }

            let rows = sqlx::query_as::<_, PixelRow>(
                r#"
                SELECT x, y, color, author_id, updated_at FROM pixels
                WHERE canvas_id = $1
                  AND x >= 0 AND x < $2 AND y >= 0 AND y < $3
                  AND ($4::BIGINT IS NULL OR (y, x) > ($4, $5))
                ORDER BY y, x
                LIMIT $6
                "#,
            )
            .bind(canvas_id)
            .bind(i64::from(width))
            .bind(i64::from(height))
            .bind(cursor.after.map(|(y, _)| y))
            .bind(cursor.after.map(|(_, x)| x))
            .bind(page_size)
            .fetch_all(&self.pool)
            .await?;

            let next = ScanCursor {
                after: rows.last().map(|r| (r.y, r.x)).or(cursor.after),
                done: (rows.len() as i64) < page_size,
            };
            let page: Vec<Result<Pixel, StoreError>> =
                rows.into_iter().map(|row| Ok(Pixel::from(row))).collect();

            Ok::<_, StoreError>(Some((page, next)))
        })
        .map_ok(stream::iter)
        .try_flatten()
        .boxed()
    }

    async fn delete_pixels(&self, canvas_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM pixels WHERE canvas_id = $1")
            .bind(canvas_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn last_action(
        &self,
        category: &str,
        writer_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT updated_at FROM rate_limits WHERE category = $1 AND writer_id = $2",
        )
        .bind(category)
        .bind(writer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.0))
    }

    async fn record_action(
        &self,
        category: &str,
        writer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO rate_limits (category, writer_id, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (category, writer_id)
            DO UPDATE SET updated_at = $3
            "#,
        )
        .bind(category)
        .bind(writer_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
