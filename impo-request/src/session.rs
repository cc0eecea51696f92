//! Optimistic editing of one purchase request.
//!
//! Each open request is owned by a single actor task. Commands are applied to
//! local state immediately; the write to the repository is debounced and, if
//! it fails, local state is rolled back to the last snapshot the store
//! accepted.

use crate::models::{PurchaseRequest, RequestError, RequestStatus};
use crate::repository::{RepositoryError, RequestRepository};
use chrono::Utc;
use impo_catalog::{NewProduct, PricingEngine, Product, ProductEdit, ProductField};
use impo_shared::models::{DomainEvent, RequestEvent};
use impo_shared::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Quiet period after the last edit before writing
    pub debounce: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

/// Result of an inline edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditOutcome {
    Applied,
    /// Input did not parse; nothing changed
    Ignored,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Failed to persist request: {0}")]
    Sync(#[from] RepositoryError),

    #[error("Request session is closed")]
    Closed,
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Command {
    Snapshot(oneshot::Sender<PurchaseRequest>),
    AddProduct {
        draft: NewProduct,
        reply: Reply<Product>,
    },
    EditProduct {
        product_id: Uuid,
        field: ProductField,
        raw: String,
        reply: Reply<EditOutcome>,
    },
    RemoveProduct {
        product_id: Uuid,
        reply: Reply<Product>,
    },
    SetExchangeRate {
        rate: Option<Decimal>,
        reply: Reply<()>,
    },
    SetFinalPrice {
        amount: Decimal,
        currency: Currency,
        reply: Reply<Decimal>,
    },
    ClearFinalPrice(Reply<()>),
    ChangeStatus {
        status: RequestStatus,
        reply: Reply<PurchaseRequest>,
    },
    Flush(Reply<PurchaseRequest>),
    Discard(oneshot::Sender<()>),
}

/// Cheap, cloneable handle to a request session.
///
/// The actor stops once every handle is dropped; a pending debounced write is
/// discarded at that point.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    request_id: Uuid,
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Spawn the actor for `request`, which must be the state the store currently holds.
    pub fn spawn(
        request: PurchaseRequest,
        engine: Arc<PricingEngine>,
        repo: Arc<dyn RequestRepository>,
        events: broadcast::Sender<DomainEvent>,
        config: SessionConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let request_id = request.id;

        let actor = SessionActor {
            confirmed: request.clone(),
            current: request,
            engine,
            repo,
            events,
            debounce: config.debounce,
            deadline: None,
            stopped: false,
        };
        tokio::spawn(actor.run(rx));

        Self { request_id, tx }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).await.map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Current local state, including edits not yet written.
    pub async fn snapshot(&self) -> Result<PurchaseRequest, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn add_product(&self, draft: NewProduct) -> Result<Product, SessionError> {
        self.call(|reply| Command::AddProduct { draft, reply }).await
    }

    /// Inline edit from raw editor input. Unparseable numbers are ignored.
    pub async fn edit_product(
        &self,
        product_id: Uuid,
        field: ProductField,
        raw: impl Into<String>,
    ) -> Result<EditOutcome, SessionError> {
        let raw = raw.into();
        self.call(|reply| Command::EditProduct { product_id, field, raw, reply })
            .await
    }

    pub async fn remove_product(&self, product_id: Uuid) -> Result<Product, SessionError> {
        self.call(|reply| Command::RemoveProduct { product_id, reply }).await
    }

    pub async fn set_exchange_rate(&self, rate: Option<Decimal>) -> Result<(), SessionError> {
        self.call(|reply| Command::SetExchangeRate { rate, reply }).await
    }

    /// Returns the stored PEN value.
    pub async fn set_final_price(&self, amount: Decimal, currency: Currency) -> Result<Decimal, SessionError> {
        self.call(|reply| Command::SetFinalPrice { amount, currency, reply })
            .await
    }

    pub async fn clear_final_price(&self) -> Result<(), SessionError> {
        self.call(Command::ClearFinalPrice).await
    }

    /// Status changes are written immediately rather than debounced.
    pub async fn change_status(&self, status: RequestStatus) -> Result<PurchaseRequest, SessionError> {
        self.call(|reply| Command::ChangeStatus { status, reply }).await
    }

    /// Write pending edits now.
    pub async fn flush(&self) -> Result<PurchaseRequest, SessionError> {
        self.call(Command::Flush).await
    }

    /// Stop the actor without writing. Commands queued behind this one, and
    /// any later call through a clone of this handle, fail with
    /// [`SessionError::Closed`].
    pub async fn discard(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Discard(reply)).await.is_ok() {
            let _ = rx.await;
        }
    }
}

struct SessionActor {
    /// Local state shown to the operator
    current: PurchaseRequest,
    /// Last state the store accepted
    confirmed: PurchaseRequest,
    engine: Arc<PricingEngine>,
    repo: Arc<dyn RequestRepository>,
    events: broadcast::Sender<DomainEvent>,
    debounce: Duration,
    deadline: Option<Instant>,
    stopped: bool,
}

impl SessionActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        debug!(request_id = %self.current.id, "Request session started");

        loop {
            let deadline = self.deadline;
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                _ = async move {
                    match deadline {
                        Some(at) => sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    // Failures are reported through events; nobody is waiting on a reply here
                    let _ = self.sync().await;
                }
            }
            if self.stopped {
                break;
            }
        }

        if self.deadline.is_some() {
            warn!(
                request_id = %self.current.id,
                version = self.current.version,
                "Request session closed with unsynced edits; discarding"
            );
        }
        debug!(request_id = %self.current.id, "Request session stopped");
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Snapshot(reply) => {
                let _ = reply.send(self.current.clone());
            }
            Command::AddProduct { draft, reply } => {
                let engine = self.engine.clone();
                let result = self.mutate(|req| req.add_product(draft, &engine));
                let _ = reply.send(result);
            }
            Command::EditProduct {
                product_id,
                field,
                raw,
                reply,
            } => {
                let result = match ProductEdit::parse(field, &raw) {
                    Some(edit) => self
                        .mutate(|req| req.edit_product(product_id, edit).map(|_| ()))
                        .map(|_| EditOutcome::Applied),
                    None => {
                        debug!(request_id = %self.current.id, %field, raw = %raw, "Ignoring unparseable input");
                        Ok(EditOutcome::Ignored)
                    }
                };
                let _ = reply.send(result);
            }
            Command::RemoveProduct { product_id, reply } => {
                let result = self.mutate(|req| req.remove_product(product_id));
                let _ = reply.send(result);
            }
            Command::SetExchangeRate { rate, reply } => {
                let result = self.mutate(|req| req.set_exchange_rate(rate));
                let _ = reply.send(result);
            }
            Command::SetFinalPrice {
                amount,
                currency,
                reply,
            } => {
                let rate = self.engine.exchange_rate(self.current.exchange_rate);
                let result = self.mutate(|req| req.set_final_price(amount, currency, rate));
                let _ = reply.send(result);
            }
            Command::ClearFinalPrice(reply) => {
                let result = self.mutate(|req| req.clear_final_price());
                let _ = reply.send(result);
            }
            Command::ChangeStatus { status, reply } => {
                let result = self.change_status(status).await;
                let _ = reply.send(result);
            }
            Command::Flush(reply) => {
                let result = self.sync().await.map(|_| self.current.clone());
                let _ = reply.send(result);
            }
            Command::Discard(reply) => {
                info!(request_id = %self.current.id, version = self.current.version, "Request session discarded");
                self.deadline = None;
                self.stopped = true;
                let _ = reply.send(());
            }
        }
    }

    /// Apply `f` to a copy of the local state; on success the copy becomes
    /// current and the debounce timer restarts.
    fn mutate<T>(
        &mut self,
        f: impl FnOnce(&mut PurchaseRequest) -> Result<T, RequestError>,
    ) -> Result<T, SessionError> {
        let mut next = self.current.clone();
        let out = f(&mut next)?;

        self.current = next;
        self.deadline = Some(Instant::now() + self.debounce);
        self.emit(RequestEvent::Updated {
            request_id: self.current.id,
            version: self.current.version,
            timestamp: Utc::now().timestamp(),
        });
        Ok(out)
    }

    async fn change_status(&mut self, status: RequestStatus) -> Result<PurchaseRequest, SessionError> {
        let previous = self.mutate(|req| req.transition(status))?;

        self.emit(RequestEvent::StatusChanged {
            request_id: self.current.id,
            from: previous.to_string(),
            to: status.to_string(),
            timestamp: Utc::now().timestamp(),
        });
        info!(request_id = %self.current.id, from = %previous, to = %status, "Request status changed");

        self.sync().await?;
        Ok(self.current.clone())
    }

    /// Write local state if it differs from the confirmed snapshot.
    async fn sync(&mut self) -> Result<(), SessionError> {
        self.deadline = None;
        if self.current == self.confirmed {
            return Ok(());
        }

        match self.repo.save(&self.current).await {
            Ok(()) => {
                self.confirmed = self.current.clone();
                debug!(request_id = %self.current.id, version = self.current.version, "Request synced");
                self.emit(RequestEvent::Synced {
                    request_id: self.current.id,
                    version: self.current.version,
                    timestamp: Utc::now().timestamp(),
                });
                Ok(())
            }
            Err(e) => {
                error!(
                    request_id = %self.current.id,
                    failed_version = self.current.version,
                    restored_version = self.confirmed.version,
                    "Failed to persist request, rolling back: {}",
                    e
                );
                self.current = self.confirmed.clone();
                self.emit(RequestEvent::SyncFailed {
                    request_id: self.current.id,
                    restored_version: self.current.version,
                    error: e.to_string(),
                    timestamp: Utc::now().timestamp(),
                });
                Err(e.into())
            }
        }
    }

    fn emit(&self, event: RequestEvent) {
        // No subscribers is fine
        let _ = self.events.send(event.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewRequest;
    use crate::test_support::RecordingRepository;
    use std::str::FromStr;
    use std::sync::atomic::Ordering;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    struct Fixture {
        handle: SessionHandle,
        repo: Arc<RecordingRepository>,
        events: broadcast::Receiver<DomainEvent>,
        product_id: Uuid,
    }

    fn fixture() -> Fixture {
        let engine = PricingEngine::default();
        let mut request = PurchaseRequest::new(NewRequest {
            client_name: "Lucía Flores".to_string(),
            client_phone: None,
            notes: None,
            exchange_rate: Some(d("3.7")),
        })
        .unwrap();
        let product = request
            .add_product(
                NewProduct {
                    name: "Tablet".to_string(),
                    link: None,
                    base_price: d("200"),
                    profit_amount: d("74"),
                    tax_percent: d("18"),
                    weight_kg: d("0.6"),
                },
                &engine,
            )
            .unwrap();

        let repo = Arc::new(RecordingRepository::default());
        let (tx, events) = broadcast::channel(64);
        let handle = SessionHandle::spawn(
            request,
            Arc::new(engine),
            repo.clone(),
            tx,
            SessionConfig::default(),
        );

        Fixture {
            handle,
            repo,
            events,
            product_id: product.id,
        }
    }

    fn drain(events: &mut broadcast::Receiver<DomainEvent>) -> Vec<RequestEvent> {
        let mut out = Vec::new();
        while let Ok(DomainEvent::Request(e)) = events.try_recv() {
            out.push(e);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_apply_immediately_and_write_after_debounce() {
        let f = fixture();

        let outcome = f.handle.edit_product(f.product_id, ProductField::BasePrice, "250").await.unwrap();
        assert_eq!(outcome, EditOutcome::Applied);

        // Local state is updated before any write
        let local = f.handle.snapshot().await.unwrap();
        assert_eq!(local.product(f.product_id).unwrap().price, d("295"));
        assert!(f.repo.saves().is_empty());

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(f.repo.saves().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let saves = f.repo.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0], local);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subsequent_edits_restart_the_timer() {
        let f = fixture();

        for raw in ["210", "220", "230"] {
            f.handle.edit_product(f.product_id, ProductField::BasePrice, raw).await.unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert!(f.repo.saves().is_empty());

        tokio::time::sleep(Duration::from_millis(300)).await;
        let saves = f.repo.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].product(f.product_id).unwrap().base_price, d("230"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_rolls_back() {
        let mut f = fixture();
        let original = f.handle.snapshot().await.unwrap();
        f.repo.fail.store(true, Ordering::SeqCst);

        f.handle.edit_product(f.product_id, ProductField::TaxPercent, "0").await.unwrap();
        f.handle.set_final_price(d("500"), Currency::Pen).await.unwrap();
        assert_ne!(f.handle.snapshot().await.unwrap(), original);

        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(f.handle.snapshot().await.unwrap(), original);
        let events = drain(&mut f.events);
        assert!(matches!(
            events.last(),
            Some(RequestEvent::SyncFailed { restored_version, error, .. })
                if *restored_version == original.version && error.contains("connection reset")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_input_is_ignored() {
        let mut f = fixture();
        let before = f.handle.snapshot().await.unwrap();

        let outcome = f.handle.edit_product(f.product_id, ProductField::BasePrice, "12,3,4x").await.unwrap();
        assert_eq!(outcome, EditOutcome::Ignored);
        assert_eq!(f.handle.snapshot().await.unwrap(), before);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(f.repo.saves().is_empty());
        assert!(drain(&mut f.events).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_errors_leave_state_untouched() {
        let f = fixture();
        let before = f.handle.snapshot().await.unwrap();

        let err = f.handle.edit_product(f.product_id, ProductField::TaxPercent, "150").await.unwrap_err();
        assert!(matches!(err, SessionError::Request(RequestError::Product(_))));

        let err = f.handle.remove_product(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SessionError::Request(_)));

        assert_eq!(f.handle.snapshot().await.unwrap(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_change_writes_immediately() {
        let mut f = fixture();

        let updated = f.handle.change_status(RequestStatus::Quoted).await.unwrap();
        assert_eq!(updated.status, RequestStatus::Quoted);

        let saves = f.repo.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].status, RequestStatus::Quoted);

        let events = drain(&mut f.events);
        assert!(events.iter().any(|e| matches!(e, RequestEvent::StatusChanged { to, .. } if to == "QUOTED")));
        assert!(matches!(events.last(), Some(RequestEvent::Synced { .. })));

        let err = f.handle.change_status(RequestStatus::Delivered).await.unwrap_err();
        assert!(matches!(err, SessionError::Request(RequestError::InvalidTransition { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_input_keeps_session_alive() {
        let f = fixture();
        let before = f.handle.snapshot().await.unwrap();

        let err = f
            .handle
            .set_exchange_rate(Some(d("0.0000000000000000000000000001")))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Request(RequestError::Validation(_))));

        let err = f
            .handle
            .edit_product(f.product_id, ProductField::BasePrice, "79228162514264337593543950335")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Request(RequestError::Product(_))));

        let err = f
            .handle
            .set_final_price(d("79228162514264337593543950335"), Currency::Usd)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Request(RequestError::Validation(_))));

        // The actor is still running and nothing changed
        assert!(!f.handle.is_closed());
        assert_eq!(f.handle.snapshot().await.unwrap(), before);

        let added = f
            .handle
            .add_product(NewProduct {
                name: "Cargador".to_string(),
                link: None,
                base_price: d("20"),
                profit_amount: d("100"),
                tax_percent: d("0"),
                weight_kg: d("0.1"),
            })
            .await
            .unwrap();
        // 20 + 100 / 3.7
        assert!(added.price > d("47") && added.price < d("48"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_stops_every_clone() {
        let f = fixture();
        let clone = f.handle.clone();

        clone.edit_product(f.product_id, ProductField::BasePrice, "300").await.unwrap();
        f.handle.discard().await;

        assert!(matches!(clone.flush().await, Err(SessionError::Closed)));
        assert!(matches!(clone.snapshot().await, Err(SessionError::Closed)));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(f.repo.saves().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_and_drop() {
        let f = fixture();

        f.handle.set_exchange_rate(Some(d("3.9"))).await.unwrap();
        let flushed = f.handle.flush().await.unwrap();
        assert_eq!(flushed.exchange_rate, Some(d("3.9")));
        assert_eq!(f.repo.saves().len(), 1);

        // Pending edit is discarded when the last handle goes away
        f.handle.clear_final_price().await.unwrap();
        drop(f.handle);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.repo.saves().len(), 1);
    }
}
