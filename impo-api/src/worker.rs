use impo_promo::PromotionService;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

/// Periodically move promotions past their end date off the active column.
pub async fn start_promotion_expiry_worker(promotions: Arc<PromotionService>, every: Duration) {
    info!("Promotion expiry worker started, checking every {:?}", every);
    let mut ticker = interval(every);

    loop {
        ticker.tick().await;
        match promotions.deactivate_expired().await {
            Ok(changed) if !changed.is_empty() => info!("Deactivated {} expired promotions", changed.len()),
            Ok(_) => {}
            Err(e) => error!("Failed to deactivate expired promotions: {}", e),
        }
    }
}
