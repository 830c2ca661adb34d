use crate::interface_adapters::protocol::{ServerMessage, decode};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::ids::next_id;
use crate::use_cases::{GameEvent, GameHandle, GameMessage};

use axum::{
    extract::{
        State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    InputClosed,
    DirectClosed,
    UpdatesClosed,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);

/// Serializes each broadcast once and fans the shared bytes out to every connection.
pub async fn update_serializer(
    mut updates_rx: broadcast::Receiver<GameMessage>,
    update_bytes_tx: broadcast::Sender<Utf8Bytes>,
    update_latest_tx: watch::Sender<Utf8Bytes>,
) {
    loop {
        match updates_rx.recv().await {
            Ok(update) => {
                let has_state = update.snapshot.is_some();
                let msg = ServerMessage::from(update);
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize game update");
                        continue;
                    }
                };

                let bytes = Utf8Bytes::from(txt);
                // Only full-state messages are useful for lag recovery.
                if has_state {
                    let _ = update_latest_tx.send(bytes.clone());
                }
                let _ = update_bytes_tx.send(bytes);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "update serializer lagged; skipping to latest update");
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("game updates channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub fn spawn_update_serializer(game: &GameHandle) {
    tokio::spawn(update_serializer(
        game.updates_tx.subscribe(),
        game.update_bytes_tx.clone(),
        game.update_latest_tx.clone(),
    ));
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let game = state.game.clone();
    let direct_capacity = state.direct_channel_capacity;
    let conn_id = next_id();
    ws.on_upgrade(move |socket| {
        handle_socket(socket, game, conn_id, direct_capacity).instrument(info_span!("conn", conn_id))
    })
}

async fn handle_socket(
    mut socket: WebSocket,
    game: GameHandle,
    conn_id: u64,
    direct_capacity: usize,
) {
    let mut ctx = match bootstrap_connection(&game, conn_id, direct_capacity).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = socket.close().await;
            return;
        }
    };
    info!("client connected");

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

struct ConnCtx {
    pub conn_id: u64,
    pub input_tx: mpsc::Sender<GameEvent>,
    // Replies addressed to this connection only (init, roleUpdate, error).
    pub direct_rx: mpsc::Receiver<GameMessage>,
    pub update_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    pub update_latest_rx: watch::Receiver<Utf8Bytes>,
    // Count lag recovery snapshots sent to this client.
    pub lag_recovery_count: u64,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_messages: u32,

    pub last_input_full_log: Instant,
    pub last_update_lag_log: Instant,
    pub last_invalid_input_log: Instant,
}

async fn bootstrap_connection(
    game: &GameHandle,
    conn_id: u64,
    direct_capacity: usize,
) -> Result<ConnCtx, NetError> {
    // Subscribe before announcing the connection so the first lobby update is not missed.
    let update_bytes_rx = game.update_bytes_tx.subscribe();
    let update_latest_rx = game.update_latest_tx.subscribe();
    let (direct_tx, direct_rx) = mpsc::channel::<GameMessage>(direct_capacity);

    game.input_tx
        .send(GameEvent::Connect { conn_id, direct_tx })
        .await
        .map_err(|_| NetError::InputClosed)?;

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        conn_id,
        input_tx: game.input_tx.clone(),
        direct_rx,
        update_bytes_rx,
        update_latest_rx,
        lag_recovery_count: 0,

        msgs_in: 0,
        msgs_out: 0,
        bytes_in: 0,
        bytes_out: 0,

        invalid_messages: 0,

        last_input_full_log: now,
        last_update_lag_log: now,
        last_invalid_input_log: now,
    })
}

enum LoopControl {
    Continue,
    Disconnect,
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let conn_id = ctx.conn_id;

    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        input_tx,
        direct_rx,
        update_bytes_rx,
        update_latest_rx,
        lag_recovery_count,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_messages,
        last_input_full_log,
        last_update_lag_log,
        last_invalid_input_log,
        ..
    } = ctx;

    let mut fatal: Option<NetError> = None;

    loop {
        let disconnect: bool = tokio::select! {
            // Direct replies go first so `init` precedes the broadcasts it triggers.
            biased;

            direct = direct_rx.recv() => {
                match direct {
                    Some(message) => {
                        let msg = ServerMessage::from(message);
                        match send_message(socket, &msg).await {
                            Ok(bytes) => {
                                *msgs_out += 1;
                                *bytes_out += bytes as u64;
                                false
                            }
                            Err(err) => {
                                warn!(error = ?err, "failed to send direct message");
                                true
                            }
                        }
                    }
                    None => {
                        fatal = Some(NetError::DirectClosed);
                        true
                    }
                }
            }

            update = update_bytes_rx.recv() => {
                match update {
                    Ok(bytes) => match forward_update_bytes(bytes, socket, msgs_out, bytes_out).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(last_update_lag_log) {
                            warn!(missed = n, "game updates lagged; sending snapshot");
                        }

                        // Resync strategy: send the latest full-state message.
                        let latest = update_latest_rx.borrow().clone();
                        if latest.is_empty() {
                            false
                        } else {
                            let bytes_len = latest.len();
                            *lag_recovery_count += 1;
                            let outcome =
                                forward_update_bytes(latest, socket, msgs_out, bytes_out).await;

                            if should_log(last_update_lag_log) {
                                debug!(
                                    bytes = bytes_len,
                                    count = *lag_recovery_count,
                                    "sent lag recovery snapshot"
                                );
                            }

                            match outcome {
                                LoopControl::Continue => false,
                                LoopControl::Disconnect => true,
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::UpdatesClosed);
                        true
                    }
                }
            }

            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    conn_id,
                    input_tx,
                    msgs_in,
                    bytes_in,
                    invalid_messages,
                    last_input_full_log,
                    last_invalid_input_log,
                ) {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(
        conn_id,
        input_tx,
        *msgs_in,
        *msgs_out,
        *bytes_in,
        *bytes_out,
        *invalid_messages,
        *lag_recovery_count,
    )
    .await
    {
        warn!(error = ?e, "error during disconnect cleanup");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_incoming_ws(
    incoming: Option<Result<Message, axum::Error>>,
    conn_id: u64,
    input_tx: &mpsc::Sender<GameEvent>,
    msgs_in: &mut u64,
    bytes_in: &mut u64,
    invalid_messages: &mut u32,
    last_input_full_log: &mut Instant,
    last_invalid_input_log: &mut Instant,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                *msgs_in += 1;
                *bytes_in += text.len() as u64;

                let command = match decode(&text) {
                    Ok(command) => command,
                    Err(err) => {
                        // Malformed input never costs the client its connection.
                        *invalid_messages += 1;
                        if should_log(last_invalid_input_log) {
                            warn!(
                                conn_id,
                                bytes = text.len(),
                                error = %err,
                                "failed to parse client message"
                            );
                        }
                        return Ok(LoopControl::Continue);
                    }
                };

                match input_tx.try_send(GameEvent::Command { conn_id, command }) {
                    Ok(()) => Ok(LoopControl::Continue),
                    Err(TrySendError::Full(_evt)) => {
                        if should_log(last_input_full_log) {
                            warn!(conn_id, "input channel full; dropping command");
                        }
                        Ok(LoopControl::Continue)
                    }
                    Err(TrySendError::Closed(_evt)) => Err(NetError::InputClosed),
                }
            }
            Message::Binary(_) => {
                *invalid_messages += 1;
                if should_log(last_invalid_input_log) {
                    warn!(conn_id, "binary message ignored");
                }
                Ok(LoopControl::Continue)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(conn_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(conn_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_update_bytes(
    update: Utf8Bytes,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    let bytes_len = update.len();
    match socket
        .send(Message::Text(update))
        .await
        .map_err(NetError::Ws)
    {
        Ok(()) => {
            *msgs_out += 1;
            *bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            warn!(error = ?err, "failed to send game update");
            LoopControl::Disconnect
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn disconnect_cleanup(
    conn_id: u64,
    input_tx: &mpsc::Sender<GameEvent>,
    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid_messages: u32,
    lag_recovery_count: u64,
) -> Result<(), NetError> {
    input_tx
        .send(GameEvent::Disconnect { conn_id })
        .await
        .map_err(|_| NetError::InputClosed)?;

    debug!(
        conn_id,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_messages,
        lag_recovery_count,
        "connection stats"
    );
    info!(conn_id, "client disconnected");
    Ok(())
}
