//! WebSocket session handling.
//!
//! One task pair per connection: the reader loop dispatches decoded client
//! events, a writer task drains the connection's outbound channel. The
//! token is verified before the upgrade; an invalid token never reaches
//! the event loop.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use palaver_shared::{ClientEvent, ConnId, ServerEvent, UserId};

use crate::api::AppState;
use crate::auth::AuthedUser;
use crate::calls::{AnswerOutcome, EndOutcome, RequestOutcome};
use crate::error::ServerError;
use crate::presence::EventSender;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: String,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ServerError> {
    let user = state.auth.verify(&query.token)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(state, socket, user)))
}

async fn handle_socket(state: AppState, socket: WebSocket, user: AuthedUser) {
    let conn = ConnId::new();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(json) => Message::Text(json.into()),
                Err(e) => {
                    warn!(error = %e, "failed to encode outbound event");
                    continue;
                }
            };
            if ws_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    info!(identity = %user.id, ?conn, "session opened");
    state
        .directory
        .register(user.id.clone(), user.name.clone(), conn, tx.clone())
        .await;
    state.directory.broadcast_presence().await;

    while let Some(Ok(frame)) = ws_rx.next().await {
        let text = match &frame {
            Message::Text(text) => text.as_str(),
            Message::Close(_) => break,
            // Pings are answered by axum; other frame types carry no events.
            _ => continue,
        };

        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => dispatch(&state, &user, conn, &tx, event).await,
            Err(e) => {
                debug!(identity = %user.id, error = %e, "undecodable frame");
                let _ = tx.send(ServerEvent::MessageError {
                    error: "Could not process message".to_string(),
                });
            }
        }
    }

    info!(identity = %user.id, ?conn, "session closed");
    close_session(&state, &user, conn).await;
    writer.abort();
}

/// Cleanup after a socket closes. Presence and calls are only torn down
/// when the closing socket is still the registered connection: a stale
/// close arriving after a reconnect leaves both intact, because the
/// identity is still reachable through the newer connection.
async fn close_session(state: &AppState, user: &AuthedUser, conn: ConnId) {
    if !state.directory.remove(&user.id, conn).await {
        debug!(identity = %user.id, ?conn, "stale socket close, keeping calls");
        return;
    }

    state.directory.broadcast_presence().await;
    for peer in state.calls.disconnect(&user.id).await {
        state
            .relay
            .deliver(
                &peer,
                ServerEvent::CallEnd {
                    from: user.id.clone(),
                },
            )
            .await;
    }
}

async fn dispatch(
    state: &AppState,
    user: &AuthedUser,
    conn: ConnId,
    tx: &EventSender,
    event: ClientEvent,
) {
    match event {
        ClientEvent::Join { identity } => {
            // The connection already carries a verified identity; a join
            // for anyone else is refused.
            if identity != user.id {
                warn!(identity = %user.id, claimed = %identity, "join for foreign identity");
                return;
            }
            state
                .directory
                .register(user.id.clone(), user.name.clone(), conn, tx.clone())
                .await;
            state.directory.broadcast_presence().await;
        }

        ClientEvent::PrivateSend { message } => {
            state.relay.relay_private(&user.id, message).await;
        }

        ClientEvent::CallRequest { to, kind } => {
            if state.directory.lookup(&to).await.is_none() {
                debug!(from = %user.id, to = %to, "call request to offline identity");
                return;
            }
            match state.calls.request(&user.id, &to, kind).await {
                RequestOutcome::Ring { generation } => {
                    state
                        .relay
                        .deliver(
                            &to,
                            ServerEvent::CallRequest {
                                from: user.id.clone(),
                                name: user.name.clone(),
                                kind,
                            },
                        )
                        .await;
                    state.calls.spawn_ring_timeout(
                        state.relay.clone(),
                        user.id.clone(),
                        to,
                        generation,
                    );
                }
                RequestOutcome::Busy => {
                    let name = state
                        .directory
                        .lookup_name(&to)
                        .await
                        .unwrap_or_else(|| to.to_string());
                    let _ = tx.send(ServerEvent::CallAnswer {
                        from: to,
                        accepted: false,
                        kind,
                        name,
                    });
                }
            }
        }

        // The answering client also sends a media kind, but the call is
        // labelled by what the caller requested; the session's recorded
        // kind is authoritative.
        ClientEvent::CallAnswer { to, accepted, .. } => {
            match state.calls.answer(&user.id, &to, accepted).await {
                AnswerOutcome::Accepted { kind } | AnswerOutcome::Rejected { kind } => {
                    state
                        .relay
                        .deliver(
                            &to,
                            ServerEvent::CallAnswer {
                                from: user.id.clone(),
                                accepted,
                                kind,
                                name: user.name.clone(),
                            },
                        )
                        .await;
                }
                AnswerOutcome::Ignored => {
                    debug!(from = %user.id, to = %to, "answer without a ringing call");
                }
            }
        }

        ClientEvent::CallEnd { to } => match state.calls.end(&user.id, &to).await {
            EndOutcome::Ended => {
                state
                    .relay
                    .deliver(
                        &to,
                        ServerEvent::CallEnd {
                            from: user.id.clone(),
                        },
                    )
                    .await;
            }
            EndOutcome::Ignored => {
                debug!(from = %user.id, to = %to, "end without an active call");
            }
        },

        ClientEvent::Offer { to, sdp } => {
            forward(state, &user.id, &to, ServerEvent::Offer {
                from: user.id.clone(),
                sdp,
            })
            .await;
        }

        ClientEvent::Answer { to, sdp } => {
            forward(state, &user.id, &to, ServerEvent::Answer {
                from: user.id.clone(),
                sdp,
            })
            .await;
        }

        ClientEvent::Candidate { to, candidate } => {
            forward(state, &user.id, &to, ServerEvent::Candidate {
                from: user.id.clone(),
                candidate,
            })
            .await;
        }
    }
}

async fn forward(state: &AppState, from: &UserId, to: &UserId, event: ServerEvent) {
    if !state.relay.deliver(to, event).await {
        debug!(from = %from, to = %to, "dropping signal for unreachable peer");
    }
}
