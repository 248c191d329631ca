//! Server-Sent Events (SSE) stream of playback signals
//!
//! Each bus signal becomes one SSE event named after the signal
//! (`playback-started` / `playback-stopped`) with the JSON signal as data.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::api::AppState;

/// GET /events
pub async fn event_stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    let stream = BroadcastStream::new(state.signals.watch()).filter_map(|result| async move {
        match result {
            Ok(signal) => match Event::default().event(signal.kind.name()).json_data(&signal) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    warn!("Failed to serialize signal: {}", e);
                    None
                }
            },
            Err(e) => {
                // Lagged client; it simply misses older signals
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"))
}
