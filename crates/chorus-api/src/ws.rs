//! HTTP upgrade handler and the per-connection bridge loop: JSON text
//! frames in, projected `WireFrame`s out, one socket per client.

use crate::bridge::WebSocketBridge;
use crate::types::{ClientCommand, WireFrame};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

const FRAME_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn ws_handler(ws: WebSocketUpgrade, State(bridge): State<Arc<WebSocketBridge>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, bridge))
}

pub async fn handle_socket(mut socket: WebSocket, bridge: Arc<WebSocketBridge>) {
    let (client, mut frames) = bridge.register_client().await;
    info!(client = %client.id, "client connected");

    if !send_frame(&mut socket, &WireFrame::new("connected", json!({ "client_id": client.id }))).await {
        bridge.unregister_client(client.id).await;
        return;
    }

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !handle_command(&text, &client, &mut socket).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        match tokio::time::timeout(FRAME_WRITE_TIMEOUT, socket.send(Message::Pong(data))).await {
                            Ok(Ok(())) => {}
                            _ => break,
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(client = %client.id, "recv error: {e}");
                        break;
                    }
                }
            }
            result = frames.recv() => {
                match result {
                    Ok(frame) => {
                        if !send_frame(&mut socket, &frame).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(client = %client.id, "client lagged by {n} frames");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    bridge.unregister_client(client.id).await;
    info!(client = %client.id, "client disconnected");
}

/// Returns `false` if a reply write failed and the connection should close.
async fn handle_command(
    text: &str,
    client: &Arc<crate::bridge::ClientHandle>,
    socket: &mut WebSocket,
) -> bool {
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(e) => {
            return send_frame(socket, &WireFrame::new("error", json!({ "message": format!("invalid command: {e}") }))).await;
        }
    };

    match command {
        ClientCommand::SubscribeChannel { channel_id } => {
            client.subscribe_channel(channel_id.clone()).await;
            send_frame(socket, &WireFrame::new("subscribed", json!({ "channel_id": channel_id }))).await
        }
        ClientCommand::UnsubscribeChannel { channel_id } => {
            client.unsubscribe_channel(&channel_id).await;
            send_frame(socket, &WireFrame::new("unsubscribed", json!({ "channel_id": channel_id }))).await
        }
        ClientCommand::SubscribeMinion { minion_id } => {
            client.subscribe_minion(minion_id.clone()).await;
            send_frame(socket, &WireFrame::new("subscribed", json!({ "minion_id": minion_id }))).await
        }
        ClientCommand::UnsubscribeMinion { minion_id } => {
            client.unsubscribe_minion(&minion_id).await;
            send_frame(socket, &WireFrame::new("unsubscribed", json!({ "minion_id": minion_id }))).await
        }
        ClientCommand::GetSubscriptions => {
            let (channels, minions) = client.subscriptions().await;
            send_frame(
                socket,
                &WireFrame::new("subscriptions", json!({ "channels": channels, "minions": minions })),
            )
            .await
        }
        ClientCommand::Ping => send_frame(socket, &WireFrame::empty("pong")).await,
    }
}

/// Writes a frame under a bounded deadline. Returns `false` on timeout or
/// send error, signalling the caller to drop the connection.
async fn send_frame(socket: &mut WebSocket, frame: &WireFrame) -> bool {
    let Ok(json) = serde_json::to_string(frame) else {
        return true;
    };
    matches!(
        tokio::time::timeout(FRAME_WRITE_TIMEOUT, socket.send(Message::Text(json))).await,
        Ok(Ok(()))
    )
}
