//! Editor WebSocket connections
//!
//! One connection per open editor tab. Credentials come from the upgrade
//! request's cookies and stay fixed for the life of the connection. Each
//! inbound frame is handled on its own task, so responses can leave in a
//! different order than their requests arrived; clients correlate them by
//! `callbackID`.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use emuws_common::protocol::ResponseEnvelope;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::cookies::SessionCookies;
use crate::dispatch::{ConnectionCredentials, Dispatcher};
use crate::AppState;

/// Body of a plain GET on the WebSocket path
pub const EMPTY_ENDPOINT: &str = "You have requested an empty endpoint.";

/// GET /
///
/// Upgrades when the request asks for a WebSocket, answers with a short
/// text otherwise.
pub async fn websocket_or_empty(
    State(state): State<AppState>,
    SessionCookies(credentials): SessionCookies,
    upgrade: Option<WebSocketUpgrade>,
) -> Response {
    match upgrade {
        Some(upgrade) => upgrade
            .on_upgrade(move |socket| serve_connection(socket, state.dispatcher, credentials)),
        None => EMPTY_ENDPOINT.into_response(),
    }
}

/// Run one editor connection until the client goes away
pub async fn serve_connection(
    socket: WebSocket,
    dispatcher: Arc<Dispatcher>,
    credentials: ConnectionCredentials,
) {
    let span = info_span!("connection", id = %Uuid::new_v4());
    async move {
        info!(
            token = %credentials.redacted_token(),
            project = credentials.project_id.as_deref().unwrap_or("<none>"),
            "Client connected"
        );

        if let (Some(token), Some(project_id)) = (&credentials.token, &credentials.project_id) {
            if let Some(identity) = dispatcher.gate().cached_identity(token, project_id) {
                debug!("Recently authorized as {}", identity.display_name());
            }
        }

        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<ResponseEnvelope>();

        let writer = tokio::spawn(
            async move {
                while let Some(response) = rx.recv().await {
                    let text = match serde_json::to_string(&response) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Could not encode response: {}", e);
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text)).await.is_err() {
                        debug!("Socket closed while sending");
                        break;
                    }
                }
            }
            .in_current_span(),
        );

        while let Some(frame) = stream.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!("Dropping binary frame that is not UTF-8");
                        continue;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!("Receive failed: {}", e);
                    break;
                }
            };

            let dispatcher = dispatcher.clone();
            let credentials = credentials.clone();
            let tx = tx.clone();
            tokio::spawn(
                async move {
                    if let Some(response) = dispatcher.handle_message(&credentials, &text).await {
                        // Receiver is gone once the socket is closed
                        let _ = tx.send(response);
                    }
                }
                .in_current_span(),
            );
        }

        // Writer drains whatever in-flight handlers still produce
        drop(tx);
        if let Err(e) = writer.await {
            error!("Writer task failed: {}", e);
        }

        info!("Client disconnected");
    }
    .instrument(span)
    .await
}
