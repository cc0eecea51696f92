use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::{Stream, StreamExt};
use impo_shared::models::DomainEvent;
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Only events for this request; promotion board events are always sent
    pub request_id: Option<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/events", get(stream_events))
}

pub async fn stream_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let request_id = query.request_id;
        async move {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!("Event stream lagged: {}", e);
                    return None;
                }
            };

            if let (Some(wanted), DomainEvent::Request(e)) = (request_id, &event) {
                if e.request_id() != wanted {
                    return None;
                }
            }

            Event::default().event(event.name()).json_data(&event).ok().map(Ok)
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
