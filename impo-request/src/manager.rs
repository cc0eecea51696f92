use crate::models::{NewRequest, PurchaseRequest, RequestError};
use crate::repository::{RequestFilter, RequestPage, RequestRepository};
use crate::session::{SessionConfig, SessionError, SessionHandle};
use impo_catalog::PricingEngine;
use impo_shared::models::DomainEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

/// Keeps one session per open purchase request.
pub struct RequestManager {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    repo: Arc<dyn RequestRepository>,
    engine: Arc<PricingEngine>,
    events: broadcast::Sender<DomainEvent>,
    config: SessionConfig,
}

impl RequestManager {
    pub fn new(
        repo: Arc<dyn RequestRepository>,
        engine: Arc<PricingEngine>,
        events: broadcast::Sender<DomainEvent>,
        config: SessionConfig,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            repo,
            engine,
            events,
            config,
        }
    }

    /// Create and persist a new request, then open a session for it.
    pub async fn create(&self, new: NewRequest) -> Result<PurchaseRequest, SessionError> {
        let request = PurchaseRequest::new(new)?;
        self.repo.save(&request).await?;
        info!(request_id = %request.id, client = %request.client_name, "Purchase request created");

        let handle = self.spawn(request.clone());
        self.sessions.write().await.insert(request.id, handle);
        Ok(request)
    }

    /// Session for `id`, loading the request from the store on first use.
    pub async fn open(&self, id: Uuid) -> Result<SessionHandle, SessionError> {
        if let Some(handle) = self.sessions.read().await.get(&id) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }

        let mut sessions = self.sessions.write().await;
        // Another caller may have opened it while we waited for the lock
        if let Some(handle) = sessions.get(&id) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }

        let request = self.repo.get(id).await?.ok_or(RequestError::NotFound(id))?;
        let handle = self.spawn(request);
        sessions.insert(id, handle.clone());
        Ok(handle)
    }

    /// Flush pending edits and forget the session.
    pub async fn close(&self, id: Uuid) -> Result<(), SessionError> {
        let handle = self.sessions.write().await.remove(&id);
        if let Some(handle) = handle {
            handle.flush().await?;
        }
        Ok(())
    }

    /// Close every open session, writing what is pending. Used on shutdown;
    /// returns how many sessions failed to write.
    pub async fn close_all(&self) -> usize {
        let ids: Vec<Uuid> = self.sessions.read().await.keys().copied().collect();

        let mut failed = 0;
        for id in ids {
            if let Err(e) = self.close(id).await {
                warn!(request_id = %id, error = %e, "Failed to flush request on close");
                failed += 1;
            }
        }
        info!(failed, "Request sessions closed");
        failed
    }

    /// Persisted requests; open sessions may hold newer, unsynced edits.
    pub async fn list(&self, filter: &RequestFilter) -> Result<RequestPage, SessionError> {
        Ok(self.repo.list(filter).await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), SessionError> {
        // Held until the row is gone so `open` cannot reload it meanwhile
        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.remove(&id) {
            handle.discard().await;
        }

        if self.repo.delete(id).await? {
            info!(request_id = %id, "Purchase request deleted");
            Ok(())
        } else {
            Err(RequestError::NotFound(id).into())
        }
    }

    pub async fn open_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn spawn(&self, request: PurchaseRequest) -> SessionHandle {
        SessionHandle::spawn(
            request,
            self.engine.clone(),
            self.repo.clone(),
            self.events.clone(),
            self.config.clone(),
        )
    }
}
