use impo_catalog::PricingEngine;
use impo_promo::{PromotionRepository, PromotionService};
use impo_request::{RequestManager, RequestRepository, SessionConfig};
use impo_shared::models::DomainEvent;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_BUFFER: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PricingEngine>,
    pub requests: Arc<RequestManager>,
    pub promotions: Arc<PromotionService>,
    pub events_tx: broadcast::Sender<DomainEvent>,
    proforma_seq: Arc<AtomicU32>,
}

impl AppState {
    pub async fn new(
        engine: PricingEngine,
        request_repo: Arc<dyn RequestRepository>,
        promotion_repo: Arc<dyn PromotionRepository>,
        session: SessionConfig,
        max_active_promotions: usize,
    ) -> anyhow::Result<Self> {
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
        let engine = Arc::new(engine);

        let requests = RequestManager::new(request_repo, engine.clone(), events_tx.clone(), session);
        let promotions = PromotionService::load(promotion_repo, events_tx.clone(), max_active_promotions).await?;

        Ok(Self {
            engine,
            requests: Arc::new(requests),
            promotions: Arc::new(promotions),
            events_tx,
            proforma_seq: Arc::new(AtomicU32::new(0)),
        })
    }

    /// Next proforma number within this process, starting at 1.
    pub fn next_proforma_sequence(&self) -> u32 {
        self.proforma_seq.fetch_add(1, Ordering::SeqCst) + 1
    }
}
