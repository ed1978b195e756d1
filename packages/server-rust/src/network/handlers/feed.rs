//! `GET /users/feed`: the record set over a `WebSocket`.
//!
//! Each snapshot is sent as `{"type":"snapshot","users":[...]}`. When the
//! store ends the feed a final `{"type":"terminated","error":"..."}` frame is
//! sent and the socket is closed. Client frames other than close are ignored.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use usersync_core::User;

use super::error::ApiError;
use super::AppState;
use crate::network::config::FeedConfig;
use crate::records::{FeedEvent, RecordFeed};

/// One outbound frame.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedFrame<'a> {
    Snapshot { users: &'a [User] },
    Terminated { error: String },
}

/// Opens the record feed, then upgrades. A store that cannot open the feed
/// answers 503 instead of upgrading.
pub async fn feed_upgrade_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let feed = match state.adapter.watch() {
        Ok(feed) => feed,
        Err(e) => return ApiError::from(e).into_response(),
    };
    let config = state.config.feed.clone();
    let shutdown = state.shutdown.shutdown_receiver();

    ws.write_buffer_size(config.ws_write_buffer_size)
        .max_write_buffer_size(config.ws_max_write_buffer_size)
        .on_upgrade(move |socket| run_feed(socket, feed, config, shutdown))
}

async fn run_feed(
    mut socket: WebSocket,
    mut feed: RecordFeed,
    config: FeedConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("feed client connected");

    if !*shutdown.borrow_and_update() {
        loop {
            tokio::select! {
                event = feed.next() => match event {
                    Some(FeedEvent::Snapshot(users)) => {
                        let frame = FeedFrame::Snapshot { users: &users };
                        if !send_frame(&mut socket, &frame, &config).await {
                            break;
                        }
                    }
                    Some(FeedEvent::Terminated(error)) => {
                        let frame = FeedFrame::Terminated { error: error.to_string() };
                        send_frame(&mut socket, &frame, &config).await;
                        break;
                    }
                    None => break,
                },
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                _ = shutdown.changed() => break,
            }
        }
    }

    let _ = socket.send(Message::Close(None)).await;
    info!("feed client disconnected");
}

/// Sends one JSON frame. Returns `false` if the client is gone or too slow.
async fn send_frame(socket: &mut WebSocket, frame: &FeedFrame<'_>, config: &FeedConfig) -> bool {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to encode feed frame");
            return false;
        }
    };
    match tokio::time::timeout(config.send_timeout, socket.send(Message::Text(text.into()))).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "feed send failed");
            false
        }
        Err(_) => {
            warn!("feed send timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_frame_shape() {
        let users = vec![User::new("Ana", "a@x.io", 30).with_id("u1")];
        let json = serde_json::to_value(FeedFrame::Snapshot { users: &users }).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["users"][0]["id"], "u1");
        assert_eq!(json["users"][0]["age"], 30);
    }

    #[test]
    fn terminated_frame_shape() {
        let json = serde_json::to_value(FeedFrame::Terminated {
            error: "store unavailable: offline".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "terminated");
        assert_eq!(json["error"], "store unavailable: offline");
    }
}
