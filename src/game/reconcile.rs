//! Authoritative state reconciliation
//!
//! Single writer for the confirmed self state and the others roster. Every
//! operation here is applied in the order the channel delivered the event.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::ws::protocol::JoinPayload;
use crate::ws::{ClientEvent, SessionChannel};

use super::state::{ConnectionPhase, Player, PositionSource, SelfState, SessionState, Stats};
use super::{is_local, PlayerId, Vec2};

/// What the caller has to do after an event was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Applied,
    /// Dropped: wrong phase or stale
    Ignored,
    /// The session is over; timers must stop
    Teardown,
}

/// Reconciles local state against the authoritative stream
pub struct StateReconciler;

impl StateReconciler {
    /// The peer confirmed the connection and assigned our id
    pub fn connected(state: &mut SessionState, id: PlayerId) -> Reconciled {
        if state.phase != ConnectionPhase::Connecting {
            warn!(
                player_id = %id,
                phase = ?state.phase,
                "Unexpected connection confirmation"
            );
            return Reconciled::Ignored;
        }

        info!(player_id = %id, "Connected to arena");
        state.local_id = Some(id);
        state.phase = ConnectionPhase::Joined;
        Reconciled::Applied
    }

    /// Enter the arena under `name`, spawning at `spawn`
    pub fn join(
        state: &mut SessionState,
        name: &str,
        character: Option<String>,
        spawn: Vec2,
        channel: &dyn SessionChannel,
    ) -> Result<(), JoinError> {
        match state.phase {
            ConnectionPhase::Connecting | ConnectionPhase::Disconnected => {
                return Err(JoinError::NotConnected)
            }
            ConnectionPhase::Active => return Err(JoinError::AlreadyJoined),
            ConnectionPhase::Joined => {}
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(JoinError::BlankName);
        }

        state.self_state = Some(SelfState::spawn(name.to_string(), character.clone(), spawn));
        state.phase = ConnectionPhase::Active;
        channel.emit(ClientEvent::Join(JoinPayload {
            name: name.to_string(),
            character,
        }));

        info!(player_name = name, "Joined arena");
        Ok(())
    }

    /// Full roster replace (`playersState` and `updatePlayerList`)
    pub fn replace_roster(state: &mut SessionState, players: Vec<Player>) -> Reconciled {
        if !Self::tracks_roster(state) {
            debug!(count = players.len(), "Roster before connection confirmed, dropping");
            return Reconciled::Ignored;
        }

        let mut others = HashMap::with_capacity(players.len());
        for player in players {
            if Self::is_self(state, &player.id) {
                Self::adopt_confirmed(state, &player);
                continue;
            }
            others.insert(player.id.clone(), player);
        }

        state.others.replace(others);
        // A full snapshot is the new truth; earlier departures no longer apply.
        state.departed.clear();
        Reconciled::Applied
    }

    /// Upsert one player (`playerMoved`)
    pub fn player_moved(state: &mut SessionState, player: Player) -> Reconciled {
        if !Self::tracks_roster(state) {
            debug!(player_id = %player.id, "Move before connection confirmed, dropping");
            return Reconciled::Ignored;
        }
        if state.departed.contains(&player.id) {
            debug!(player_id = %player.id, "Move for departed player, dropping");
            return Reconciled::Ignored;
        }

        if Self::is_self(state, &player.id) {
            Self::adopt_confirmed(state, &player);
        } else {
            state.others.upsert(player);
        }
        Reconciled::Applied
    }

    /// `playerDisconnected`
    pub fn player_disconnected(state: &mut SessionState, id: PlayerId) -> Reconciled {
        if !Self::tracks_roster(state) {
            debug!(player_id = %id, "Disconnect before connection confirmed, dropping");
            return Reconciled::Ignored;
        }

        if Self::is_self(state, &id) {
            info!(player_id = %id, "Disconnected by peer");
            Self::teardown(state);
            return Reconciled::Teardown;
        }

        if state.others.remove(&id).is_some() {
            info!(player_id = %id, remaining = state.others.len(), "Player left");
        }
        state.departed.insert(id);
        Reconciled::Applied
    }

    /// `playerHit`: count a death and optionally respawn
    pub fn player_hit(state: &mut SessionState, respawn: Option<Vec2>) -> Reconciled {
        if !state.is_active() {
            debug!(phase = ?state.phase, "Hit outside active phase, dropping");
            return Reconciled::Ignored;
        }
        let Some(me) = state.self_state.as_mut() else {
            return Reconciled::Ignored;
        };

        me.stats.deaths = me.stats.deaths.saturating_add(1);
        if let Some(position) = respawn {
            me.position = position;
            me.source = PositionSource::Confirmed;
        }
        info!(
            deaths = me.stats.deaths,
            respawned = respawn.is_some(),
            "Local player hit"
        );
        Reconciled::Applied
    }

    /// Release all derived state
    pub fn teardown(state: &mut SessionState) {
        state.clear();
    }

    fn tracks_roster(state: &SessionState) -> bool {
        matches!(state.phase, ConnectionPhase::Joined | ConnectionPhase::Active)
    }

    fn is_self(state: &SessionState, id: &PlayerId) -> bool {
        state
            .local_id
            .as_ref()
            .is_some_and(|local| is_local(local, id))
    }

    /// Authoritative record for the local player overrides any prediction
    fn adopt_confirmed(state: &mut SessionState, record: &Player) {
        if state.phase != ConnectionPhase::Active {
            return;
        }
        let Some(me) = state.self_state.as_mut() else {
            return;
        };

        if let Some(position) = record.position {
            me.position = position;
            me.source = PositionSource::Confirmed;
        }
        if let Some(stats) = record.stats {
            adopt_stats(&mut me.stats, stats);
        }
        if !record.name.is_empty() {
            me.name.clone_from(&record.name);
        }
        if record.character.is_some() {
            me.character.clone_from(&record.character);
        }
    }
}

/// Counters never go backwards; a lower authoritative value is stale
fn adopt_stats(current: &mut Stats, incoming: Stats) {
    if incoming.kills < current.kills || incoming.deaths < current.deaths {
        warn!(
            kills = incoming.kills,
            deaths = incoming.deaths,
            current_kills = current.kills,
            current_deaths = current.deaths,
            "Ignoring stale stats"
        );
    }
    current.kills = current.kills.max(incoming.kills);
    current.deaths = current.deaths.max(incoming.deaths);
}

/// Reasons a join request is refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("not connected to the arena yet")]
    NotConnected,

    #[error("player name must not be blank")]
    BlankName,

    #[error("already in the arena")]
    AlreadyJoined,
}
