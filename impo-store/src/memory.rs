//! Repositories kept in process memory, used when no database is configured
//! and by the API tests.

use async_trait::async_trait;
use impo_promo::{Promotion, PromotionRepoError, PromotionRepository};
use impo_request::{PurchaseRequest, RepositoryError, RequestFilter, RequestPage, RequestRepository};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<Uuid, PurchaseRequest>>,
}

impl InMemoryRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn get(&self, id: Uuid) -> Result<Option<PurchaseRequest>, RepositoryError> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn save(&self, request: &PurchaseRequest) -> Result<(), RepositoryError> {
        self.requests.write().await.insert(request.id, request.clone());
        Ok(())
    }

    async fn list(&self, filter: &RequestFilter) -> Result<RequestPage, RepositoryError> {
        let requests = self.requests.read().await;
        let mut matching: Vec<&PurchaseRequest> = requests
            .values()
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let items = matching
            .iter()
            .skip(usize::try_from(filter.offset()).unwrap_or(usize::MAX))
            .take(filter.per_page() as usize)
            .map(|r| (*r).clone())
            .collect();

        Ok(RequestPage {
            items,
            total: matching.len() as u64,
            page: filter.page(),
            per_page: filter.per_page(),
        })
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.requests.write().await.remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryPromotionRepository {
    promotions: RwLock<HashMap<Uuid, Promotion>>,
}

impl InMemoryPromotionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromotionRepository for InMemoryPromotionRepository {
    async fn list(&self) -> Result<Vec<Promotion>, PromotionRepoError> {
        Ok(self.promotions.read().await.values().cloned().collect())
    }

    async fn save_all(&self, promotions: &[Promotion]) -> Result<(), PromotionRepoError> {
        let mut stored = self.promotions.write().await;
        for promo in promotions {
            stored.insert(promo.id, promo.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, PromotionRepoError> {
        Ok(self.promotions.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use impo_request::{NewRequest, RequestStatus};

    fn request(name: &str) -> PurchaseRequest {
        PurchaseRequest::new(NewRequest {
            client_name: name.to_string(),
            client_phone: None,
            notes: None,
            exchange_rate: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_filters_and_pages_newest_first() {
        let repo = InMemoryRequestRepository::new();
        let base = Utc::now();
        for i in 0..5 {
            let mut r = request(&format!("Cliente {}", i));
            r.created_at = base + Duration::minutes(i);
            if i % 2 == 0 {
                r.transition(RequestStatus::Quoted).unwrap();
            }
            repo.save(&r).await.unwrap();
        }

        let page = repo
            .list(&RequestFilter {
                status: Some(RequestStatus::Quoted),
                page: Some(1),
                per_page: Some(2),
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].client_name, "Cliente 4");
        assert_eq!(page.items[1].client_name, "Cliente 2");

        let second = repo
            .list(&RequestFilter {
                status: Some(RequestStatus::Quoted),
                page: Some(2),
                per_page: Some(2),
            })
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].client_name, "Cliente 0");

        let past_the_end = repo
            .list(&RequestFilter {
                status: None,
                page: Some(u32::MAX),
                per_page: Some(100),
            })
            .await
            .unwrap();
        assert!(past_the_end.items.is_empty());
        assert_eq!(past_the_end.total, 5);
    }

    #[tokio::test]
    async fn test_save_replaces_and_delete_reports() {
        let repo = InMemoryRequestRepository::new();
        let mut r = request("Rosa Huamán");
        repo.save(&r).await.unwrap();

        r.notes = Some("Entregar en Arequipa".to_string());
        repo.save(&r).await.unwrap();
        assert_eq!(repo.get(r.id).await.unwrap().unwrap().notes, r.notes);

        assert!(repo.delete(r.id).await.unwrap());
        assert!(!repo.delete(r.id).await.unwrap());
        assert!(repo.get(r.id).await.unwrap().is_none());
    }
}
