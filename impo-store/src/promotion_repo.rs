use async_trait::async_trait;
use chrono::{DateTime, Utc};
use impo_promo::{Promotion, PromotionRepoError, PromotionRepository, PromotionStatus};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

pub struct PgPromotionRepository {
    pool: PgPool,
}

impl PgPromotionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PromotionRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    discount_percent: Decimal,
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    status: String,
    position: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PromotionRow> for Promotion {
    fn from(row: PromotionRow) -> Self {
        Promotion {
            id: row.id,
            title: row.title,
            description: row.description,
            discount_percent: row.discount_percent,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            // Anything unrecognised is treated as off the storefront
            status: PromotionStatus::parse(&row.status).unwrap_or(PromotionStatus::Inactive),
            position: row.position.max(0) as u32,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn backend(e: sqlx::Error) -> PromotionRepoError {
    PromotionRepoError::Backend(e.to_string())
}

#[async_trait]
impl PromotionRepository for PgPromotionRepository {
    async fn list(&self) -> Result<Vec<Promotion>, PromotionRepoError> {
        let rows: Vec<PromotionRow> = sqlx::query_as(
            "SELECT id, title, description, discount_percent, starts_at, ends_at, status, position, created_at, updated_at \
             FROM promotions ORDER BY status, position",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(Promotion::from).collect())
    }

    async fn save_all(&self, promotions: &[Promotion]) -> Result<(), PromotionRepoError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        for promo in promotions {
            sqlx::query(
                r#"
                INSERT INTO promotions
                    (id, title, description, discount_percent, starts_at, ends_at, status, position, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (id) DO UPDATE SET
                    title = EXCLUDED.title,
                    description = EXCLUDED.description,
                    discount_percent = EXCLUDED.discount_percent,
                    starts_at = EXCLUDED.starts_at,
                    ends_at = EXCLUDED.ends_at,
                    status = EXCLUDED.status,
                    position = EXCLUDED.position,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(promo.id)
            .bind(&promo.title)
            .bind(&promo.description)
            .bind(promo.discount_percent)
            .bind(promo.starts_at)
            .bind(promo.ends_at)
            .bind(promo.status.as_str())
            .bind(promo.position as i32)
            .bind(promo.created_at)
            .bind(promo.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        debug!(count = promotions.len(), "Promotions saved");
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, PromotionRepoError> {
        let result = sqlx::query("DELETE FROM promotions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }
}
