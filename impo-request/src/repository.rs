use crate::models::{PurchaseRequest, RequestStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

/// Listing filter for the requests table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    /// 1-based
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl RequestFilter {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    /// Rows to skip. Computed in 64 bits so the last `u32` page cannot overflow.
    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.per_page())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPage {
    pub items: Vec<PurchaseRequest>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// Repository trait for purchase request persistence
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<PurchaseRequest>, RepositoryError>;

    /// Insert or replace the whole request
    async fn save(&self, request: &PurchaseRequest) -> Result<(), RepositoryError>;

    /// Newest first
    async fn list(&self, filter: &RequestFilter) -> Result<RequestPage, RepositoryError>;

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Storage backend error: {0}")]
    Backend(String),
}
