pub mod app_config;
pub mod database;
pub mod memory;
pub mod promotion_repo;
pub mod request_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use memory::{InMemoryPromotionRepository, InMemoryRequestRepository};
pub use promotion_repo::PgPromotionRepository;
pub use request_repo::PgRequestRepository;
