pub mod models;
pub mod quote;
pub mod repository;
pub mod session;
pub mod manager;
pub mod proforma;

#[cfg(test)]
mod test_support;

pub use models::{check_final_price, check_rate, NewRequest, PurchaseRequest, RequestError, RequestStatus};
pub use quote::{adjustment_percent, QuoteView};
pub use repository::{RepositoryError, RequestFilter, RequestPage, RequestRepository};
pub use session::{EditOutcome, SessionConfig, SessionError, SessionHandle};
pub use manager::RequestManager;
pub use proforma::{
    ClientInfo, DocumentType, Proforma, ProformaConditions, ProformaError, ProformaItem, ProformaStep,
    ProformaSummary, ProformaWizard, IGV_RATE,
};
