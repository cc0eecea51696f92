use crate::models::Promotion;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait PromotionRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Promotion>, PromotionRepoError>;

    /// Upsert every given promotion in one transaction.
    async fn save_all(&self, promotions: &[Promotion]) -> Result<(), PromotionRepoError>;

    async fn delete(&self, id: Uuid) -> Result<bool, PromotionRepoError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PromotionRepoError {
    #[error("Storage backend error: {0}")]
    Backend(String),
}
