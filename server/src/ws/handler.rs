use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        rejection::QueryRejection,
        Query, State,
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::auth::AdmissionError;
use crate::chat::ChatEvent;
use crate::state::AppState;
use crate::ws::actor;
use crate::ws::broadcast::encode_event;

/// Query parameters for the chat upgrade. Auth is via `?token=JWT`.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// GET / and GET /ws
///
/// Upgrade requests join the admin chat; plain GETs get the liveness text.
/// Rejected connections are upgraded, sent one system notice, then closed.
/// A query string that does not parse (e.g. a repeated `token`) counts as
/// no token.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    query: Result<Query<WsAuthQuery>, QueryRejection>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(_) => return crate::routes::index().await.into_response(),
    };

    let token = match query {
        Ok(Query(params)) => params.token,
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable chat upgrade query");
            None
        }
    };

    match state.admission.admit(token.as_deref()) {
        Ok(identity) => {
            tracing::info!(identity = %identity, "Chat connection admitted");
            let relay = state.relay.clone();
            ws.on_upgrade(move |socket| actor::run_connection(socket, relay, identity))
        }
        Err(err) => {
            tracing::warn!(reason = %err, "Chat connection rejected");
            ws.on_upgrade(move |socket| reject(socket, err))
        }
    }
}

/// Send the rejection notice, then close. The connection never enters the registry.
async fn reject(mut socket: WebSocket, err: AdmissionError) {
    if let Some(frame) = encode_event(&ChatEvent::system(err.notice())) {
        let _ = socket.send(frame).await;
    }
    let _ = socket.send(Message::Close(None)).await;
}
