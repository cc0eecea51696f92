//! Two-column promotion board (active / inactive) with drag-and-drop ordering.

use crate::models::{NewPromotion, Promotion, PromotionStatus};
use crate::repository::PromotionRepoError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub const DEFAULT_MAX_ACTIVE: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardColumns {
    pub active: Vec<Promotion>,
    pub inactive: Vec<Promotion>,
    pub max_active: usize,
}

/// In-memory board state. Never holds more than `max_active` active promotions.
#[derive(Debug, Clone)]
pub struct PromotionBoard {
    promotions: Vec<Promotion>,
    max_active: usize,
}

impl PromotionBoard {
    pub fn new(max_active: usize) -> Self {
        Self {
            promotions: Vec::new(),
            max_active,
        }
    }

    /// Rebuild a board from stored promotions. Active promotions beyond
    /// `max_active` (by position) are moved to the inactive column.
    ///
    /// Returns the board and the promotions whose status or position had to
    /// be corrected, so the caller can write them back.
    pub fn from_promotions(
        mut promotions: Vec<Promotion>,
        max_active: usize,
        now: DateTime<Utc>,
    ) -> (Self, Vec<Promotion>) {
        let stored: HashMap<Uuid, (PromotionStatus, u32)> =
            promotions.iter().map(|p| (p.id, (p.status, p.position))).collect();
        promotions.sort_by_key(|p| (p.status != PromotionStatus::Active, p.position, p.created_at));

        let mut active = 0;
        for promo in promotions.iter_mut().filter(|p| p.is_active()) {
            active += 1;
            if active > max_active {
                promo.status = PromotionStatus::Inactive;
            }
        }

        let mut board = Self { promotions, max_active };
        let order_active = board.column_ids(PromotionStatus::Active, None);
        let order_inactive = board.column_ids(PromotionStatus::Inactive, None);
        board.renumber(&order_active, &order_inactive);

        let corrected = board.changed_since(&stored, now);
        (board, corrected)
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    pub fn active_count(&self) -> usize {
        self.promotions.iter().filter(|p| p.is_active()).count()
    }

    pub fn len(&self) -> usize {
        self.promotions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.promotions.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Promotion> {
        self.promotions.iter().find(|p| p.id == id)
    }

    /// New promotions start inactive at the end of the column.
    pub fn add(&mut self, new: NewPromotion, now: DateTime<Utc>) -> Result<Promotion, PromotionError> {
        new.validate().map_err(PromotionError::Validation)?;

        let position = self.column_len(PromotionStatus::Inactive) as u32;
        let promotion = new.into_promotion(position, now);
        self.promotions.push(promotion.clone());
        Ok(promotion)
    }

    /// Remove a promotion; returns it with the promotions whose position shifted.
    pub fn remove(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<(Promotion, Vec<Promotion>), PromotionError> {
        let idx = self
            .promotions
            .iter()
            .position(|p| p.id == id)
            .ok_or(PromotionError::NotFound(id))?;

        let before = self.layout();
        let removed = self.promotions.remove(idx);

        let active = self.column_ids(PromotionStatus::Active, None);
        let inactive = self.column_ids(PromotionStatus::Inactive, None);
        self.renumber(&active, &inactive);

        Ok((removed, self.changed_since(&before, now)))
    }

    /// Drop `id` into `column` at `index` (clamped to the column length).
    ///
    /// Returns every promotion whose status or position changed.
    pub fn move_to(
        &mut self,
        id: Uuid,
        column: PromotionStatus,
        index: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Promotion>, PromotionError> {
        let promo = self.get(id).ok_or(PromotionError::NotFound(id))?;

        if column == PromotionStatus::Active && !promo.is_active() {
            if promo.is_expired(now) {
                return Err(PromotionError::Expired(id));
            }
            if self.active_count() >= self.max_active {
                return Err(PromotionError::ActiveLimitReached { max: self.max_active });
            }
        }

        let before = self.layout();

        let mut active = self.column_ids(PromotionStatus::Active, Some(id));
        let mut inactive = self.column_ids(PromotionStatus::Inactive, Some(id));
        let target = match column {
            PromotionStatus::Active => &mut active,
            PromotionStatus::Inactive => &mut inactive,
        };
        target.insert(index.min(target.len()), id);

        if let Some(p) = self.promotions.iter_mut().find(|p| p.id == id) {
            p.status = column;
        }
        self.renumber(&active, &inactive);

        Ok(self.changed_since(&before, now))
    }

    /// Move active promotions whose end date has passed to the top of the
    /// inactive column.
    pub fn deactivate_expired(&mut self, now: DateTime<Utc>) -> Vec<Promotion> {
        let expired: Vec<Uuid> = self
            .promotions
            .iter()
            .filter(|p| p.is_active() && p.is_expired(now))
            .map(|p| p.id)
            .collect();
        if expired.is_empty() {
            return Vec::new();
        }

        let before = self.layout();
        let active: Vec<Uuid> = self
            .column_ids(PromotionStatus::Active, None)
            .into_iter()
            .filter(|id| !expired.contains(id))
            .collect();
        let mut inactive = expired.clone();
        inactive.extend(self.column_ids(PromotionStatus::Inactive, None));

        for p in self.promotions.iter_mut().filter(|p| expired.contains(&p.id)) {
            p.status = PromotionStatus::Inactive;
        }
        self.renumber(&active, &inactive);

        self.changed_since(&before, now)
    }

    /// Drop a card and leave every other position as it is.
    pub(crate) fn forget(&mut self, id: Uuid) {
        self.promotions.retain(|p| p.id != id);
    }

    pub fn columns(&self) -> BoardColumns {
        let column = |status: PromotionStatus| {
            let mut items: Vec<Promotion> = self.promotions.iter().filter(|p| p.status == status).cloned().collect();
            items.sort_by_key(|p| p.position);
            items
        };
        BoardColumns {
            active: column(PromotionStatus::Active),
            inactive: column(PromotionStatus::Inactive),
            max_active: self.max_active,
        }
    }

    fn column_len(&self, status: PromotionStatus) -> usize {
        self.promotions.iter().filter(|p| p.status == status).count()
    }

    /// Ids in `status` ordered by position, optionally leaving one out.
    fn column_ids(&self, status: PromotionStatus, exclude: Option<Uuid>) -> Vec<Uuid> {
        let mut items: Vec<&Promotion> = self
            .promotions
            .iter()
            .filter(|p| p.status == status && Some(p.id) != exclude)
            .collect();
        items.sort_by_key(|p| p.position);
        items.into_iter().map(|p| p.id).collect()
    }

    fn renumber(&mut self, active: &[Uuid], inactive: &[Uuid]) {
        let order: HashMap<Uuid, u32> = active
            .iter()
            .enumerate()
            .chain(inactive.iter().enumerate())
            .map(|(i, id)| (*id, i as u32))
            .collect();

        for p in &mut self.promotions {
            if let Some(pos) = order.get(&p.id) {
                p.position = *pos;
            }
        }
    }

    fn layout(&self) -> HashMap<Uuid, (PromotionStatus, u32)> {
        self.promotions.iter().map(|p| (p.id, (p.status, p.position))).collect()
    }

    fn changed_since(&mut self, before: &HashMap<Uuid, (PromotionStatus, u32)>, now: DateTime<Utc>) -> Vec<Promotion> {
        let mut changed = Vec::new();
        for p in &mut self.promotions {
            if before.get(&p.id) != Some(&(p.status, p.position)) {
                p.updated_at = now;
                changed.push(p.clone());
            }
        }
        changed
    }
}

impl Default for PromotionBoard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ACTIVE)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PromotionError {
    #[error("Promotion not found: {0}")]
    NotFound(Uuid),

    #[error("At most {max} promotions can be active at once")]
    ActiveLimitReached { max: usize },

    #[error("Promotion {0} has already ended")]
    Expired(Uuid),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Failed to persist promotions: {0}")]
    Repository(#[from] PromotionRepoError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn new_promo(title: &str) -> NewPromotion {
        NewPromotion {
            title: title.to_string(),
            description: None,
            discount_percent: Decimal::from(15),
            starts_at: None,
            ends_at: None,
        }
    }

    fn board_with(titles: &[&str]) -> (PromotionBoard, Vec<Uuid>) {
        let now = Utc::now();
        let mut board = PromotionBoard::default();
        let ids = titles.iter().map(|t| board.add(new_promo(t), now).unwrap().id).collect();
        (board, ids)
    }

    fn titles(items: &[Promotion]) -> Vec<&str> {
        items.iter().map(|p| p.title.as_str()).collect()
    }

    #[test]
    fn test_add_appends_inactive() {
        let (board, _) = board_with(&["Cyber Wow", "Black Friday", "Navidad"]);
        let cols = board.columns();

        assert!(cols.active.is_empty());
        assert_eq!(titles(&cols.inactive), vec!["Cyber Wow", "Black Friday", "Navidad"]);
        assert_eq!(cols.inactive.iter().map(|p| p.position).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_add_validates() {
        let mut board = PromotionBoard::default();
        let mut bad = new_promo(" ");
        assert!(matches!(board.add(bad.clone(), Utc::now()), Err(PromotionError::Validation(_))));

        bad.title = "Verano".to_string();
        bad.discount_percent = Decimal::from(120);
        assert!(board.add(bad, Utc::now()).is_err());
        assert!(board.is_empty());
    }

    #[test]
    fn test_active_limit() {
        let (mut board, ids) = board_with(&["A", "B", "C"]);
        let now = Utc::now();

        board.move_to(ids[0], PromotionStatus::Active, 0, now).unwrap();
        board.move_to(ids[1], PromotionStatus::Active, 0, now).unwrap();
        assert_eq!(board.active_count(), 2);

        let err = board.move_to(ids[2], PromotionStatus::Active, 0, now).unwrap_err();
        assert!(matches!(err, PromotionError::ActiveLimitReached { max: 2 }));
        assert_eq!(board.active_count(), 2);
        assert_eq!(board.get(ids[2]).unwrap().status, PromotionStatus::Inactive);

        // Reordering within the full active column is allowed
        board.move_to(ids[0], PromotionStatus::Active, 0, now).unwrap();
        assert_eq!(titles(&board.columns().active), vec!["A", "B"]);
    }

    #[test]
    fn test_move_renumbers_both_columns() {
        let (mut board, ids) = board_with(&["A", "B", "C", "D"]);
        let now = Utc::now();

        let changed = board.move_to(ids[1], PromotionStatus::Active, 5, now).unwrap();
        let cols = board.columns();
        assert_eq!(titles(&cols.active), vec!["B"]);
        assert_eq!(titles(&cols.inactive), vec!["A", "C", "D"]);
        assert_eq!(cols.inactive.iter().map(|p| p.position).collect::<Vec<_>>(), vec![0, 1, 2]);

        // B changed column; C and D shifted up; A stayed put
        let mut changed_titles = titles(&changed);
        changed_titles.sort();
        assert_eq!(changed_titles, vec!["B", "C", "D"]);

        // Drag D to the top of the inactive column
        board.move_to(ids[3], PromotionStatus::Inactive, 0, now).unwrap();
        assert_eq!(titles(&board.columns().inactive), vec!["D", "A", "C"]);
    }

    #[test]
    fn test_expired_cannot_be_activated() {
        let now = Utc::now();
        let mut board = PromotionBoard::default();
        let mut promo = new_promo("Día de la Madre");
        promo.starts_at = Some(now - Duration::days(10));
        promo.ends_at = Some(now - Duration::days(1));
        let id = board.add(promo, now).unwrap().id;

        let err = board.move_to(id, PromotionStatus::Active, 0, now).unwrap_err();
        assert!(matches!(err, PromotionError::Expired(_)));
    }

    #[test]
    fn test_deactivate_expired() {
        let (mut board, ids) = board_with(&["A", "B"]);
        let now = Utc::now();
        board.move_to(ids[0], PromotionStatus::Active, 0, now).unwrap();
        board.move_to(ids[1], PromotionStatus::Active, 1, now).unwrap();

        assert!(board.deactivate_expired(now).is_empty());

        let mut promotions = board.columns().active;
        promotions[0].ends_at = Some(now + Duration::hours(1));
        let (mut board, corrected) = PromotionBoard::from_promotions(promotions, 2, now);
        assert!(corrected.is_empty());

        let changed = board.deactivate_expired(now + Duration::hours(2));
        assert_eq!(changed.len(), 2);
        let cols = board.columns();
        assert_eq!(titles(&cols.active), vec!["B"]);
        assert_eq!(titles(&cols.inactive), vec!["A"]);
        assert_eq!(cols.active[0].position, 0);
    }

    #[test]
    fn test_from_promotions_enforces_limit() {
        let (mut board, ids) = board_with(&["A", "B", "C"]);
        let now = Utc::now();
        board.move_to(ids[0], PromotionStatus::Active, 0, now).unwrap();
        board.move_to(ids[1], PromotionStatus::Active, 1, now).unwrap();

        let mut stored: Vec<Promotion> = board.columns().active;
        stored.extend(board.columns().inactive);
        stored[2].status = PromotionStatus::Active;
        stored[2].position = 2;

        let (restored, corrected) = PromotionBoard::from_promotions(stored, 2, now);
        assert_eq!(restored.active_count(), 2);
        assert_eq!(titles(&restored.columns().inactive), vec!["C"]);
        assert_eq!(titles(&corrected), vec!["C"]);
        assert_eq!(corrected[0].status, PromotionStatus::Inactive);
        assert_eq!(corrected[0].position, 0);
    }

    #[test]
    fn test_remove_closes_gap() {
        let (mut board, ids) = board_with(&["A", "B", "C"]);
        let (removed, shifted) = board.remove(ids[0], Utc::now()).unwrap();

        assert_eq!(removed.title, "A");
        assert_eq!(titles(&shifted), vec!["B", "C"]);
        assert_eq!(board.columns().inactive.iter().map(|p| p.position).collect::<Vec<_>>(), vec![0, 1]);
        assert!(matches!(board.remove(ids[0], Utc::now()), Err(PromotionError::NotFound(_))));
    }
}
