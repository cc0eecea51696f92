pub mod models;
pub mod board;
pub mod repository;
pub mod service;

pub use models::{NewPromotion, Promotion, PromotionStatus};
pub use board::{BoardColumns, PromotionBoard, PromotionError, DEFAULT_MAX_ACTIVE};
pub use repository::{PromotionRepoError, PromotionRepository};
pub use service::PromotionService;
