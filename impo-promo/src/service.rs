use crate::board::{BoardColumns, PromotionBoard, PromotionError};
use crate::models::{NewPromotion, Promotion, PromotionStatus};
use crate::repository::PromotionRepository;
use chrono::Utc;
use impo_shared::models::{DomainEvent, PromotionBoardChanged};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared promotion board backed by a repository.
///
/// Every change is applied to the board first and then persisted; when the
/// write fails the board is put back the way it was.
pub struct PromotionService {
    board: Mutex<PromotionBoard>,
    repo: Arc<dyn PromotionRepository>,
    events: broadcast::Sender<DomainEvent>,
}

impl PromotionService {
    pub async fn load(
        repo: Arc<dyn PromotionRepository>,
        events: broadcast::Sender<DomainEvent>,
        max_active: usize,
    ) -> Result<Self, PromotionError> {
        let promotions = repo.list().await?;
        let (board, corrected) = PromotionBoard::from_promotions(promotions, max_active, Utc::now());
        if !corrected.is_empty() {
            repo.save_all(&corrected).await?;
            warn!(corrected = corrected.len(), max_active, "Stored promotion board corrected on load");
        }
        info!(promotions = board.len(), active = board.active_count(), "Promotion board loaded");

        Ok(Self {
            board: Mutex::new(board),
            repo,
            events,
        })
    }

    pub async fn columns(&self) -> BoardColumns {
        self.board.lock().await.columns()
    }

    pub async fn add(&self, new: NewPromotion) -> Result<Promotion, PromotionError> {
        let mut board = self.board.lock().await;
        let previous = board.clone();

        let promotion = board.add(new, Utc::now())?;
        if let Err(e) = self.repo.save_all(std::slice::from_ref(&promotion)).await {
            error!(promotion_id = %promotion.id, error = %e, "Failed to save promotion; rolling back");
            *board = previous;
            return Err(e.into());
        }

        info!(promotion_id = %promotion.id, title = %promotion.title, "Promotion created");
        self.emit(&board, vec![promotion.id]);
        Ok(promotion)
    }

    /// Drag-and-drop move. Returns the promotions that changed.
    pub async fn move_to(
        &self,
        id: Uuid,
        column: PromotionStatus,
        index: usize,
    ) -> Result<Vec<Promotion>, PromotionError> {
        let mut board = self.board.lock().await;
        let previous = board.clone();

        let changed = board.move_to(id, column, index, Utc::now())?;
        self.persist(&mut board, previous, &changed).await?;

        info!(
            promotion_id = %id,
            column = column.as_str(),
            index,
            active = board.active_count(),
            "Promotion moved"
        );
        Ok(changed)
    }

    pub async fn remove(&self, id: Uuid) -> Result<Promotion, PromotionError> {
        let mut board = self.board.lock().await;
        let previous = board.clone();

        let (removed, shifted) = board.remove(id, Utc::now())?;
        let deleted = match self.repo.delete(id).await {
            Ok(deleted) => deleted,
            Err(e) => {
                error!(promotion_id = %id, error = %e, "Failed to delete promotion; rolling back");
                *board = previous;
                return Err(e.into());
            }
        };
        if !deleted {
            // Already gone from storage; the board was stale
            info!(promotion_id = %id, "Promotion was not in storage");
        }
        if let Err(e) = self.persist(&mut board, previous, &shifted).await {
            // The row is gone, so the card stays off the board; the others keep
            // the positions storage still has for them
            board.forget(id);
            self.emit(&board, vec![id]);
            return Err(e);
        }

        info!(promotion_id = %id, "Promotion removed");
        Ok(removed)
    }

    /// Deactivate every active promotion whose end date has passed.
    pub async fn deactivate_expired(&self) -> Result<Vec<Promotion>, PromotionError> {
        let mut board = self.board.lock().await;
        let previous = board.clone();

        let changed = board.deactivate_expired(Utc::now());
        if changed.is_empty() {
            return Ok(changed);
        }
        self.persist(&mut board, previous, &changed).await?;

        info!(count = changed.len(), "Expired promotions deactivated");
        Ok(changed)
    }

    async fn persist(
        &self,
        board: &mut PromotionBoard,
        previous: PromotionBoard,
        changed: &[Promotion],
    ) -> Result<(), PromotionError> {
        if changed.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.repo.save_all(changed).await {
            error!(changed = changed.len(), error = %e, "Failed to save promotion board; rolling back");
            *board = previous;
            return Err(e.into());
        }
        self.emit(board, changed.iter().map(|p| p.id).collect());
        Ok(())
    }

    fn emit(&self, board: &PromotionBoard, promotion_ids: Vec<Uuid>) {
        let event = PromotionBoardChanged {
            promotion_ids,
            active_count: board.active_count(),
            timestamp: Utc::now().timestamp(),
        };
        // No subscribers is fine
        let _ = self.events.send(event.into());
    }
}
