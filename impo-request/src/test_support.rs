use crate::models::PurchaseRequest;
use crate::repository::{RepositoryError, RequestFilter, RequestPage, RequestRepository};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Keeps every write in order; can be told to fail.
#[derive(Default)]
pub struct RecordingRepository {
    pub saved: Mutex<Vec<PurchaseRequest>>,
    pub fail: AtomicBool,
}

impl RecordingRepository {
    pub fn saves(&self) -> Vec<PurchaseRequest> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestRepository for RecordingRepository {
    async fn get(&self, id: Uuid) -> Result<Option<PurchaseRequest>, RepositoryError> {
        Ok(self.saved.lock().unwrap().iter().rev().find(|r| r.id == id).cloned())
    }

    async fn save(&self, request: &PurchaseRequest) -> Result<(), RepositoryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RepositoryError::Backend("connection reset".to_string()));
        }
        self.saved.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn list(&self, filter: &RequestFilter) -> Result<RequestPage, RepositoryError> {
        let items = self.saves();
        Ok(RequestPage {
            total: items.len() as u64,
            items,
            page: filter.page(),
            per_page: filter.per_page(),
        })
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut saved = self.saved.lock().unwrap();
        let before = saved.len();
        saved.retain(|r| r.id != id);
        Ok(saved.len() != before)
    }
}
