//! Server-Sent Events support

use crate::runtime::SessionUpdate;
use crate::state_machine::SessionSnapshot;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    init: SessionSnapshot,
    broadcast_rx: tokio::sync::broadcast::Receiver<SessionUpdate>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Create stream that starts with the current snapshot then broadcasts
    let init = futures::stream::once(async move { Ok(snapshot_event("init", &init)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(update) => Some(Ok(update_to_event(update))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn update_to_event(update: SessionUpdate) -> Event {
    match update {
        SessionUpdate::Snapshot(snapshot) => snapshot_event("snapshot", &snapshot),
        SessionUpdate::Error { message } => Event::default().event("error").data(
            json!({
                "type": "error",
                "message": message
            })
            .to_string(),
        ),
    }
}

fn snapshot_event(event_type: &str, snapshot: &SessionSnapshot) -> Event {
    let data = json!({
        "type": event_type,
        "session": snapshot
    });
    Event::default().event(event_type).data(data.to_string())
}
