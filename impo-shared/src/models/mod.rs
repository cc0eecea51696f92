pub mod events;

pub use events::{DomainEvent, PromotionBoardChanged, RequestEvent};
