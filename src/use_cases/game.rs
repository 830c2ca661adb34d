// The game actor: owns the `Game` aggregate and turns its directives into channel traffic.

use crate::domain::GameTuning;
use crate::use_cases::engine::Game;
use crate::use_cases::types::{Directive, GameEvent, GameMessage, ScheduledTimer, ServerState};
use axum::extract::ws::Utf8Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Channel sizing and gameplay tuning for the single game world.
#[derive(Debug, Clone)]
pub struct GameSettings {
    /// Capacity for inbound events (client commands, connects, timer fires).
    pub input_channel_capacity: usize,
    /// Capacity for broadcast game messages.
    pub broadcast_capacity: usize,
    pub tuning: GameTuning,
}

/// Channels connecting the network layer to the game actor.
#[derive(Clone)]
pub struct GameHandle {
    /// Sender for events into the world task.
    pub input_tx: mpsc::Sender<GameEvent>,
    /// Broadcast sender for raw game messages.
    pub updates_tx: broadcast::Sender<GameMessage>,
    /// Broadcast sender for serialized game messages.
    pub update_bytes_tx: broadcast::Sender<Utf8Bytes>,
    /// Watch sender holding the latest serialized broadcast.
    pub update_latest_tx: watch::Sender<Utf8Bytes>,
    /// Watch sender for the coarse server status.
    pub server_state_tx: watch::Sender<ServerState>,
}

impl GameHandle {
    /// Creates the channel wiring and spawns the world task.
    pub fn spawn(settings: GameSettings) -> Self {
        let (input_tx, input_rx) = mpsc::channel::<GameEvent>(settings.input_channel_capacity);
        let (updates_tx, _updates_rx) =
            broadcast::channel::<GameMessage>(settings.broadcast_capacity);
        let (update_bytes_tx, _update_bytes_rx) =
            broadcast::channel::<Utf8Bytes>(settings.broadcast_capacity);
        let (update_latest_tx, _update_latest_rx) =
            watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));
        let (server_state_tx, _server_state_rx) = watch::channel(ServerState::default());

        tokio::spawn(world_task(
            Game::new(settings.tuning),
            input_rx,
            input_tx.downgrade(),
            updates_tx.clone(),
            server_state_tx.clone(),
        ));

        Self {
            input_tx,
            updates_tx,
            update_bytes_tx,
            update_latest_tx,
            server_state_tx,
        }
    }
}

pub async fn world_task(
    mut game: Game,
    mut input_rx: mpsc::Receiver<GameEvent>,
    timer_tx: mpsc::WeakSender<GameEvent>,
    updates_tx: broadcast::Sender<GameMessage>,
    server_state_tx: watch::Sender<ServerState>,
) {
    let tick_period = game.tuning().board.tick_period;
    let refill_period = game.tuning().combat.refill_interval;

    // Armed only while a game is running.
    let mut tick = tokio::time::interval(tick_period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticking = false;

    let mut refill = tokio::time::interval_at(Instant::now() + refill_period, refill_period);
    refill.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut outputs = Outputs {
        direct: HashMap::new(),
        updates_tx,
        timer_tx,
    };

    loop {
        tokio::select! {
            event = input_rx.recv() => {
                let Some(event) = event else {
                    info!("input channel closed; world task exiting");
                    break;
                };
                handle_event(&mut game, &mut outputs, event);
            }
            _ = tick.tick(), if ticking => {
                game.tick();
            }
            _ = refill.tick() => {
                game.refill_bullets();
            }
        }

        for directive in game.drain_outbox() {
            match directive {
                Directive::StartTicking => {
                    if !ticking {
                        tick.reset();
                        ticking = true;
                        debug!("tick armed");
                    }
                }
                Directive::StopTicking => {
                    if ticking {
                        ticking = false;
                        debug!("tick disarmed");
                    }
                }
                other => outputs.execute(other),
            }
        }

        let state = game.server_state();
        server_state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

fn handle_event(game: &mut Game, outputs: &mut Outputs, event: GameEvent) {
    match event {
        GameEvent::Connect { conn_id, direct_tx } => {
            outputs.direct.insert(conn_id, direct_tx);
            game.connect(conn_id);
        }
        GameEvent::Disconnect { conn_id } => {
            outputs.direct.remove(&conn_id);
            game.disconnect(conn_id);
        }
        GameEvent::Command { conn_id, command } => game.handle_command(conn_id, command),
        GameEvent::Timer(timer) => game.handle_timer(timer),
    }
}

struct Outputs {
    // Per-connection queues for replies addressed to one client.
    direct: HashMap<u64, mpsc::Sender<GameMessage>>,
    updates_tx: broadcast::Sender<GameMessage>,
    timer_tx: mpsc::WeakSender<GameEvent>,
}

impl Outputs {
    fn execute(&mut self, directive: Directive) {
        match directive {
            Directive::Broadcast(message) => {
                // No receivers is fine: nobody is connected.
                let _ = self.updates_tx.send(message);
            }
            Directive::Direct { conn_id, message } => self.send_direct(conn_id, message),
            Directive::Schedule { delay, timer } => self.schedule(delay, timer),
            Directive::StartTicking | Directive::StopTicking => {}
        }
    }

    fn send_direct(&mut self, conn_id: u64, message: GameMessage) {
        let Some(tx) = self.direct.get(&conn_id) else {
            debug!(conn_id, "direct message for unknown connection dropped");
            return;
        };
        match tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(conn_id, "direct channel full; dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                self.direct.remove(&conn_id);
            }
        }
    }

    fn schedule(&self, delay: Duration, timer: ScheduledTimer) {
        let timer_tx = self.timer_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The world task is gone once every strong sender is dropped.
            if let Some(tx) = timer_tx.upgrade() {
                let _ = tx.send(GameEvent::Timer(timer)).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::use_cases::types::{ClientCommand, ServerEvent};
    use tokio::time::timeout;

    fn settings() -> GameSettings {
        let mut tuning = GameTuning::default();
        tuning.board.tick_period = Duration::from_millis(20);
        tuning.powerup.spawn_chance = 0.0;
        GameSettings {
            input_channel_capacity: 64,
            broadcast_capacity: 64,
            tuning,
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<GameMessage>) -> ServerEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("message in time")
            .expect("channel open")
            .event
    }

    #[tokio::test]
    async fn when_connection_joins_then_it_gets_init_and_lobby_update() {
        let handle = GameHandle::spawn(settings());
        let mut updates = handle.updates_tx.subscribe();
        let (direct_tx, mut direct_rx) = mpsc::channel(8);

        handle
            .input_tx
            .send(GameEvent::Connect {
                conn_id: 7,
                direct_tx,
            })
            .await
            .expect("actor alive");

        let init = timeout(Duration::from_secs(2), direct_rx.recv())
            .await
            .expect("init in time")
            .expect("direct open");
        assert!(matches!(
            init.event,
            ServerEvent::Init {
                player_id: 7,
                role: Role::Host,
                ..
            }
        ));
        assert!(init.snapshot.is_some());
        assert_eq!(next_event(&mut updates).await, ServerEvent::UpdateLobby);
    }

    #[tokio::test]
    async fn when_host_starts_game_then_ticks_broadcast_updates() {
        let handle = GameHandle::spawn(settings());
        let mut updates = handle.updates_tx.subscribe();
        let mut state_rx = handle.server_state_tx.subscribe();
        let (direct_tx, _direct_rx) = mpsc::channel(8);

        handle
            .input_tx
            .send(GameEvent::Connect {
                conn_id: 1,
                direct_tx,
            })
            .await
            .expect("actor alive");
        handle
            .input_tx
            .send(GameEvent::Command {
                conn_id: 1,
                command: ClientCommand::StartGame,
            })
            .await
            .expect("actor alive");

        assert_eq!(next_event(&mut updates).await, ServerEvent::UpdateLobby);
        assert_eq!(next_event(&mut updates).await, ServerEvent::StartGame);
        assert!(matches!(
            next_event(&mut updates).await,
            ServerEvent::Update { .. }
        ));

        timeout(
            Duration::from_secs(2),
            state_rx.wait_for(|s| s.phase == crate::domain::Phase::Running),
        )
        .await
        .expect("state in time")
        .expect("state channel open");
    }
}
