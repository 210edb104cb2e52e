use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::auth::Identity;
use crate::chat::ChatRelay;

/// Run the actor-per-connection pattern for an admitted WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards frames from an mpsc channel
/// - Reader loop: hands each inbound text frame to the relay
///
/// The relay holds a clone of the channel sender, so every broadcast reaching
/// this client goes through the single writer and keeps its order.
///
/// No idle timeout is applied: a silent client stays registered until its
/// channel closes.
pub async fn run_connection(socket: WebSocket, relay: ChatRelay, identity: Identity) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let connection_id = relay.join(identity.clone(), tx);

    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    relay.relay_frame(connection_id, text.as_str());
                }
                Message::Binary(data) => match std::str::from_utf8(&data) {
                    Ok(text) => {
                        relay.relay_frame(connection_id, text);
                    }
                    Err(e) => {
                        tracing::warn!(
                            identity = %identity,
                            error = %e,
                            "Dropping non-UTF-8 binary frame"
                        );
                    }
                },
                // Pongs are answered by the WebSocket layer.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(frame) => {
                    tracing::info!(
                        identity = %identity,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    identity = %identity,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(identity = %identity, "WebSocket stream ended");
                break;
            }
        }
    }

    relay.leave(connection_id);
    writer_handle.abort();
}

/// Writer task: receives frames from the mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // Send failed: the connection is broken
            break;
        }
    }
}
