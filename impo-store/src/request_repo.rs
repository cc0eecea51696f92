use async_trait::async_trait;
use chrono::{DateTime, Utc};
use impo_catalog::Product;
use impo_request::{PurchaseRequest, RepositoryError, RequestFilter, RequestPage, RequestRepository, RequestStatus};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

pub struct PgRequestRepository {
    pool: PgPool,
}

impl PgRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    client_name: String,
    client_phone: Option<String>,
    notes: Option<String>,
    status: String,
    products: Json<Vec<Product>>,
    exchange_rate: Option<Decimal>,
    final_price_pen: Option<Decimal>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for PurchaseRequest {
    type Error = RepositoryError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let status = RequestStatus::parse(&row.status)
            .ok_or_else(|| RepositoryError::Backend(format!("unknown request status '{}'", row.status)))?;

        Ok(PurchaseRequest {
            id: row.id,
            client_name: row.client_name,
            client_phone: row.client_phone,
            notes: row.notes,
            status,
            products: row.products.0,
            exchange_rate: row.exchange_rate,
            final_price_pen: row.final_price_pen,
            version: row.version.max(0) as u64,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, client_name, client_phone, notes, status, products, exchange_rate, \
     final_price_pen, version, created_at, updated_at FROM purchase_requests";

fn backend(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(e.to_string())
}

#[async_trait]
impl RequestRepository for PgRequestRepository {
    async fn get(&self, id: Uuid) -> Result<Option<PurchaseRequest>, RepositoryError> {
        let row: Option<RequestRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(PurchaseRequest::try_from).transpose()
    }

    async fn save(&self, request: &PurchaseRequest) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO purchase_requests
                (id, client_name, client_phone, notes, status, products, exchange_rate, final_price_pen, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                client_name = EXCLUDED.client_name,
                client_phone = EXCLUDED.client_phone,
                notes = EXCLUDED.notes,
                status = EXCLUDED.status,
                products = EXCLUDED.products,
                exchange_rate = EXCLUDED.exchange_rate,
                final_price_pen = EXCLUDED.final_price_pen,
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(request.id)
        .bind(&request.client_name)
        .bind(&request.client_phone)
        .bind(&request.notes)
        .bind(request.status.as_str())
        .bind(Json(&request.products))
        .bind(request.exchange_rate)
        .bind(request.final_price_pen)
        .bind(request.version as i64)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        debug!(request_id = %request.id, version = request.version, "Purchase request saved");
        Ok(())
    }

    async fn list(&self, filter: &RequestFilter) -> Result<RequestPage, RepositoryError> {
        let status = filter.status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM purchase_requests WHERE ($1::TEXT IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        let rows: Vec<RequestRow> = sqlx::query_as(&format!(
            "{} WHERE ($1::TEXT IS NULL OR status = $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            SELECT_COLUMNS
        ))
        .bind(status)
        .bind(i64::from(filter.per_page()))
        .bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let items = rows
            .into_iter()
            .map(PurchaseRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RequestPage {
            items,
            total: total.max(0) as u64,
            page: filter.page(),
            per_page: filter.per_page(),
        })
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM purchase_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }
}
