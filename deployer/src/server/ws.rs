//! WebSocket transport for deployment status

use std::sync::Arc;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info};

use crate::deploy::fsm::DeploymentState;
use crate::models::deployment::StatusEvent;
use crate::notify::observer::{
    ChannelObserver, Observer, ObserverMessage, CLOSE_GOING_AWAY, CLOSE_POLICY_VIOLATION,
};
use crate::server::state::ServerState;

/// Upgrade to a WebSocket streaming the status of one deployment
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, id, state))
}

/// State of a queued status event if it moves past `last`, `None` when the
/// client has already seen that state or a later one
fn advances(last: DeploymentState, payload: &str) -> Option<DeploymentState> {
    let event: StatusEvent = serde_json::from_str(payload).ok()?;
    last.can_transition_to(event.state).then_some(event.state)
}

fn close_message(code: u16, reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }))
}

async fn handle_socket(socket: WebSocket, id: String, state: Arc<ServerState>) {
    let (mut sink, mut stream) = socket.split();

    if state.orchestrator.get_deployment(&id).is_none() {
        let _ = sink
            .send(close_message(CLOSE_POLICY_VIOLATION, "Invalid Deployment ID"))
            .await;
        return;
    }

    let (observer, mut rx) = ChannelObserver::new();
    let observer: Arc<dyn Observer> = Arc::new(observer);
    state.bus.subscribe(&id, observer.clone());

    // Snapshot after subscribing so no transition falls in between
    let Some(snapshot) = state.orchestrator.get_deployment(&id) else {
        state.bus.unsubscribe(&id, observer.id());
        return;
    };
    match serde_json::to_string(&StatusEvent::from(&snapshot)) {
        Ok(payload) => {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                state.bus.unsubscribe(&id, observer.id());
                return;
            }
        }
        Err(e) => error!("Failed to serialize status for '{}': {}", id, e),
    }
    if snapshot.state.is_terminal() && state.orchestrator.settings().close_observers_on_terminal {
        let _ = sink
            .send(close_message(CLOSE_GOING_AWAY, "Deployment completed or failed"))
            .await;
        state.bus.unsubscribe(&id, observer.id());
        return;
    }

    // Events queued before the snapshot was taken may be older than it
    let mut last_state = snapshot.state;
    loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(ObserverMessage::Status(payload)) => {
                    let Some(next_state) = advances(last_state, &payload) else {
                        debug!("Dropping stale status for deployment '{}'", id);
                        continue;
                    };
                    last_state = next_state;
                    if sink.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Some(ObserverMessage::Close { code, reason }) => {
                    let _ = sink.send(close_message(code, &reason)).await;
                    break;
                }
                None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {
                    debug!("Ignoring client message for deployment '{}'", id);
                }
            },
        }
    }

    state.bus.unsubscribe(&id, observer.id());
    info!("WebSocket closed for deployment ID: {}", id);
}
