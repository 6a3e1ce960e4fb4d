//! Client session task: owns all simulation state and drives the tick loops

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Tuning;
use crate::util::time::tick_duration;
use crate::ws::{ServerEvent, SessionChannel};

use super::input::{InputEvent, InputState};
use super::movement::MovementPredictor;
use super::projectile::ProjectileSimulator;
use super::reconcile::{Reconciled, StateReconciler};
use super::state::{ConnectionPhase, SessionState, SessionView};
use super::tilemap::TileMap;

/// Handle given to the view and input layers
#[derive(Clone)]
pub struct SessionHandle {
    pub input_tx: mpsc::UnboundedSender<InputEvent>,
    pub view_rx: watch::Receiver<Arc<SessionView>>,
}

impl SessionHandle {
    /// Fire-and-forget input delivery
    pub fn send(&self, input: InputEvent) {
        let _ = self.input_tx.send(input);
    }

    /// Latest published view
    pub fn view(&self) -> Arc<SessionView> {
        Arc::clone(&self.view_rx.borrow())
    }

    pub fn shutdown(&self) {
        self.send(InputEvent::Shutdown);
    }
}

/// One connection's worth of client simulation.
///
/// Everything runs on a single task; each timer tick, inbound event or input
/// is handled to completion before the next one, so no state is locked.
pub struct ClientSession<C: SessionChannel> {
    state: SessionState,
    tiles: Arc<TileMap>,
    tuning: Tuning,
    movement: MovementPredictor,
    projectiles: ProjectileSimulator,
    input: InputState,
    channel: C,
    inbound_rx: mpsc::Receiver<ServerEvent>,
    input_rx: mpsc::UnboundedReceiver<InputEvent>,
    view_tx: watch::Sender<Arc<SessionView>>,
    version: u64,
}

impl<C: SessionChannel> ClientSession<C> {
    /// Create a session in the `Connecting` phase
    pub fn new(
        tiles: Arc<TileMap>,
        tuning: Tuning,
        channel: C,
        inbound_rx: mpsc::Receiver<ServerEvent>,
    ) -> (Self, SessionHandle) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let state = SessionState::new();
        let (view_tx, view_rx) = watch::channel(Arc::new(state.view(0)));

        let session = Self {
            state,
            tiles,
            tuning,
            movement: MovementPredictor::new(&tuning),
            projectiles: ProjectileSimulator::new(&tuning),
            input: InputState::default(),
            channel,
            inbound_rx,
            input_rx,
            view_tx,
            version: 0,
        };

        (session, SessionHandle { input_tx, view_rx })
    }

    /// Run until the session is torn down
    pub async fn run(mut self) {
        info!(
            cols = self.tiles.cols(),
            rows = self.tiles.rows(),
            tick_ms = self.tuning.tick_millis,
            "Session started"
        );

        let period = tick_duration(self.tuning.tick_millis);
        let mut movement_tick = interval(period);
        movement_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut projectile_tick = interval(period);
        projectile_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = movement_tick.tick() => self.movement_tick(),
                _ = projectile_tick.tick() => self.projectile_tick(),
                event = self.inbound_rx.recv() => match event {
                    Some(event) => self.handle_inbound(event),
                    None => {
                        info!("Inbound channel closed");
                        self.teardown();
                    }
                },
                input = self.input_rx.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => {
                        debug!("All session handles dropped");
                        self.teardown();
                    }
                },
            }

            if self.state.phase == ConnectionPhase::Disconnected {
                break;
            }
        }

        // Timers are dropped with this frame; nothing ticks after teardown.
        info!("Session ended");
    }

    /// Apply one inbound event, in delivery order
    pub fn handle_inbound(&mut self, event: ServerEvent) {
        debug!(event = event.name(), "Inbound event");
        let outcome = match event {
            ServerEvent::Connect { id } => StateReconciler::connected(&mut self.state, id),
            ServerEvent::PlayersState(players) | ServerEvent::UpdatePlayerList(players) => {
                StateReconciler::replace_roster(&mut self.state, players)
            }
            ServerEvent::PlayerMoved(player) => {
                StateReconciler::player_moved(&mut self.state, player)
            }
            ServerEvent::PlayerDisconnected(id) => {
                StateReconciler::player_disconnected(&mut self.state, id)
            }
            ServerEvent::PlayerHit { respawn } => {
                StateReconciler::player_hit(&mut self.state, respawn)
            }
            ServerEvent::BulletUpdate(snapshot) => {
                if matches!(
                    self.state.phase,
                    ConnectionPhase::Joined | ConnectionPhase::Active
                ) {
                    self.projectiles.merge_remote(&mut self.state, snapshot);
                    Reconciled::Applied
                } else {
                    Reconciled::Ignored
                }
            }
        };

        match outcome {
            Reconciled::Teardown => self.teardown(),
            Reconciled::Applied => self.publish(),
            Reconciled::Ignored => {}
        }
    }

    /// Apply one input from the input layer
    pub fn handle_input(&mut self, input: InputEvent) {
        match input {
            InputEvent::KeyDown(key) => self.input.set(key, true),
            InputEvent::KeyUp(key) => self.input.set(key, false),
            InputEvent::Aim(target) => {
                if self
                    .projectiles
                    .fire(&mut self.state, target, &self.channel)
                    .is_some()
                {
                    self.publish();
                }
            }
            InputEvent::Join { name, character } => {
                let spawn = self.tiles.center();
                match StateReconciler::join(&mut self.state, &name, character, spawn, &self.channel)
                {
                    Ok(()) => self.publish(),
                    Err(e) => warn!(error = %e, "Join rejected"),
                }
            }
            InputEvent::Shutdown => {
                info!("Shutdown requested");
                self.teardown();
            }
        }
    }

    pub fn movement_tick(&mut self) {
        if self
            .movement
            .tick(&mut self.state, self.input, &self.tiles, &self.channel)
            .is_some()
        {
            self.publish();
        }
    }

    pub fn projectile_tick(&mut self) {
        if !self.state.is_active() {
            return;
        }
        self.projectiles
            .tick(&mut self.state, &self.tiles, &self.channel);
        self.publish();
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Clear everything, release the transport, and publish the final view
    fn teardown(&mut self) {
        StateReconciler::teardown(&mut self.state);
        self.input = InputState::default();
        self.channel.close();
        self.publish();
    }

    fn publish(&mut self) {
        self.version += 1;
        self.view_tx
            .send_replace(Arc::new(self.state.view(self.version)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::Key;
    use crate::game::state::{Player, Stats};
    use crate::game::{PlayerId, Vec2};
    use crate::ws::channel::RecordingChannel;

    fn session() -> (
        ClientSession<RecordingChannel>,
        SessionHandle,
        mpsc::Sender<ServerEvent>,
    ) {
        let tiles = Arc::new(TileMap::open(40, 40, 50.0).unwrap());
        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        let (session, handle) = ClientSession::new(
            tiles,
            Tuning::default(),
            RecordingChannel::default(),
            inbound_rx,
        );
        (session, handle, inbound_tx)
    }

    fn joined(session: &mut ClientSession<RecordingChannel>) {
        session.handle_inbound(ServerEvent::Connect {
            id: PlayerId::from("A"),
        });
        session.handle_input(InputEvent::Join {
            name: "ana".into(),
            character: None,
        });
        session.channel.take();
    }

    #[test]
    fn join_spawns_at_map_centre() {
        let (mut session, handle, _inbound) = session();
        joined(&mut session);

        let view = handle.view();
        assert_eq!(view.phase, ConnectionPhase::Active);
        assert_eq!(
            view.self_state.as_ref().unwrap().position,
            Vec2::new(1000.0, 1000.0)
        );
    }

    #[test]
    fn confirmed_position_overrides_prediction() {
        let (mut session, handle, _inbound) = session();
        joined(&mut session);

        session.handle_input(InputEvent::KeyDown(Key::Right));
        session.movement_tick();
        session.movement_tick();
        assert_eq!(
            handle.view().self_state.as_ref().unwrap().position,
            Vec2::new(1010.0, 1000.0)
        );

        session.handle_inbound(ServerEvent::PlayerMoved(Player {
            id: PlayerId::from("A"),
            name: String::new(),
            character: None,
            position: Some(Vec2::new(1003.0, 1000.0)),
            stats: Some(Stats::default()),
        }));
        assert_eq!(
            handle.view().self_state.as_ref().unwrap().position,
            Vec2::new(1003.0, 1000.0)
        );

        // Prediction resumes from the confirmed position
        session.movement_tick();
        assert_eq!(
            handle.view().self_state.as_ref().unwrap().position,
            Vec2::new(1008.0, 1000.0)
        );
    }

    #[test]
    fn aim_fires_and_projectile_tick_broadcasts() {
        let (mut session, handle, _inbound) = session();
        joined(&mut session);

        session.handle_input(InputEvent::Aim(Vec2::new(2000.0, 1000.0)));
        session.projectile_tick();

        let events = session.channel.take();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name(), "newBullet");
        assert_eq!(events[1].name(), "updateBullets");
        assert_eq!(
            handle.view().local_projectiles[0].position,
            Vec2::new(1005.0, 1000.0)
        );
    }

    #[test]
    fn ticks_do_nothing_before_join() {
        let (mut session, _handle, _inbound) = session();
        session.handle_input(InputEvent::KeyDown(Key::Up));
        session.movement_tick();
        session.projectile_tick();
        assert!(session.channel.take().is_empty());
    }

    #[test]
    fn view_snapshot_is_unaffected_by_later_roster_writes() {
        let (mut session, handle, _inbound) = session();
        joined(&mut session);
        let bob = |x: f32| Player {
            id: PlayerId::from("B"),
            name: "bob".into(),
            character: None,
            position: Some(Vec2::new(x, x)),
            stats: None,
        };

        session.handle_inbound(ServerEvent::PlayerMoved(bob(1.0)));
        let before = handle.view();
        session.handle_inbound(ServerEvent::PlayerMoved(bob(2.0)));

        assert_eq!(
            before.others[&PlayerId::from("B")].position,
            Some(Vec2::new(1.0, 1.0))
        );
        assert_eq!(
            handle.view().others[&PlayerId::from("B")].position,
            Some(Vec2::new(2.0, 2.0))
        );
        assert!(handle.view().version > before.version);
    }

    #[test]
    fn shutdown_clears_state_and_stops_emitting() {
        let (mut session, handle, _inbound) = session();
        joined(&mut session);
        session.handle_input(InputEvent::KeyDown(Key::Left));
        session.handle_input(InputEvent::Aim(Vec2::new(0.0, 0.0)));
        session.channel.take();

        session.handle_input(InputEvent::Shutdown);

        let view = handle.view();
        assert_eq!(view.phase, ConnectionPhase::Disconnected);
        assert!(view.self_state.is_none());
        assert!(view.local_projectiles.is_empty());
        assert!(view.others.is_empty());

        session.movement_tick();
        session.projectile_tick();
        assert!(session.channel.take().is_empty());
    }

    #[test]
    fn join_before_connection_is_rejected() {
        let (mut session, handle, _inbound) = session();
        session.handle_input(InputEvent::Join {
            name: "ana".into(),
            character: None,
        });

        assert_eq!(handle.view().phase, ConnectionPhase::Connecting);
        assert!(session.channel.take().is_empty());
    }

    #[test]
    fn peer_disconnecting_us_tears_down() {
        let (mut session, handle, _inbound) = session();
        joined(&mut session);

        session.handle_inbound(ServerEvent::PlayerDisconnected(PlayerId::from("A")));

        assert_eq!(handle.view().phase, ConnectionPhase::Disconnected);
        assert!(handle.view().local_id.is_none());
    }
}
