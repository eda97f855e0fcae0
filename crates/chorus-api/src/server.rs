//! Router assembly and the bridge's listen loop.

use crate::ws::ws_handler;
use crate::bridge::WebSocketBridge;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(bridge: Arc<WebSocketBridge>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(bridge)
}

pub async fn serve(addr: SocketAddr, bridge: Arc<WebSocketBridge>) -> std::io::Result<()> {
    let app = router(bridge);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "websocket bridge listening");
    axum::serve(listener, app).await
}
