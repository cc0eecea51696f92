use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an open purchase request session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestEvent {
    /// Local (optimistic) state changed; not yet written.
    Updated {
        request_id: Uuid,
        version: u64,
        timestamp: i64,
    },
    Synced {
        request_id: Uuid,
        version: u64,
        timestamp: i64,
    },
    /// The write failed and local state was rolled back to `restored_version`.
    SyncFailed {
        request_id: Uuid,
        restored_version: u64,
        error: String,
        timestamp: i64,
    },
    StatusChanged {
        request_id: Uuid,
        from: String,
        to: String,
        timestamp: i64,
    },
}

impl RequestEvent {
    pub fn request_id(&self) -> Uuid {
        match self {
            RequestEvent::Updated { request_id, .. }
            | RequestEvent::Synced { request_id, .. }
            | RequestEvent::SyncFailed { request_id, .. }
            | RequestEvent::StatusChanged { request_id, .. } => *request_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionBoardChanged {
    pub promotion_ids: Vec<Uuid>,
    pub active_count: usize,
    pub timestamp: i64,
}

/// Everything pushed to the `/v1/events` stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Request(RequestEvent),
    PromotionBoard(PromotionBoardChanged),
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::Request(_) => "request",
            DomainEvent::PromotionBoard(_) => "promotion_board",
        }
    }
}

impl From<RequestEvent> for DomainEvent {
    fn from(event: RequestEvent) -> Self {
        DomainEvent::Request(event)
    }
}

impl From<PromotionBoardChanged> for DomainEvent {
    fn from(event: PromotionBoardChanged) -> Self {
        DomainEvent::PromotionBoard(event)
    }
}
