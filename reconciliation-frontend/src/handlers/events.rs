use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use crate::models::AuthContext;
use crate::AppState;

/// Server-sent stream of completed reconciliations, so list views can
/// refresh. Lagging subscribers skip missed events.
pub async fn reconciliation_events(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(user_id = ?auth.user_id, "Reconciliation event subscriber attached");

    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|message| {
        let event = match message {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Reconciliation event stream lagged");
                return None;
            }
        };

        match Event::default().event("reconciled").json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode reconciliation event");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
