//! Per-connection session state and the read-only view published to the renderer

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::projectile::{Projectile, RemoteProjectile};
use super::{PlayerId, Vec2};

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// Channel open, waiting for the peer to assign our id
    #[default]
    Connecting,
    /// Id assigned, player has not submitted a join yet
    Joined,
    /// In the arena
    Active,
    /// Terminal
    Disconnected,
}

/// Kill/death counters. Both only ever go up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub kills: u32,
    pub deaths: u32,
}

/// Mirror of another player as last reported by the authoritative peer
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub character: Option<String>,
    /// Absent when the record did not carry both coordinates
    pub position: Option<Vec2>,
    /// Absent when the record did not carry both counters
    pub stats: Option<Stats>,
}

/// Who last wrote the local player's position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSource {
    Predicted,
    Confirmed,
}

/// The local player
#[derive(Debug, Clone, PartialEq)]
pub struct SelfState {
    pub name: String,
    pub character: Option<String>,
    pub position: Vec2,
    pub source: PositionSource,
    pub stats: Stats,
}

impl SelfState {
    pub fn spawn(name: String, character: Option<String>, position: Vec2) -> Self {
        Self {
            name,
            character,
            position,
            source: PositionSource::Predicted,
            stats: Stats::default(),
        }
    }
}

/// Versioned copy-on-write map of the other players.
///
/// Readers hold an `Arc` of the map they were handed; a write clones the map
/// only if a reader still holds the previous version.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    version: u64,
    players: Arc<HashMap<PlayerId, Player>>,
}

impl Roster {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    /// Cheap handle for readers
    pub fn snapshot(&self) -> Arc<HashMap<PlayerId, Player>> {
        Arc::clone(&self.players)
    }

    pub fn replace(&mut self, players: HashMap<PlayerId, Player>) {
        self.players = Arc::new(players);
        self.version += 1;
    }

    pub fn upsert(&mut self, player: Player) {
        Arc::make_mut(&mut self.players).insert(player.id.clone(), player);
        self.version += 1;
    }

    pub fn remove(&mut self, id: &PlayerId) -> Option<Player> {
        if !self.players.contains_key(id) {
            return None;
        }
        self.version += 1;
        Arc::make_mut(&mut self.players).remove(id)
    }
}

/// Everything derived from one connection
#[derive(Debug, Default)]
pub struct SessionState {
    pub phase: ConnectionPhase,
    pub local_id: Option<PlayerId>,
    pub self_state: Option<SelfState>,
    pub others: Roster,
    pub local_projectiles: Arc<Vec<Projectile>>,
    pub remote_projectiles: Arc<Vec<RemoteProjectile>>,
    /// Ids the peer reported as disconnected since the last full roster;
    /// `playerMoved` records for them are stale
    pub departed: HashSet<PlayerId>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.phase == ConnectionPhase::Active
    }

    /// Drop all derived state and enter the terminal phase
    pub fn clear(&mut self) {
        *self = Self {
            phase: ConnectionPhase::Disconnected,
            ..Self::default()
        };
    }

    /// Immutable snapshot for the view layer
    pub fn view(&self, version: u64) -> SessionView {
        SessionView {
            version,
            phase: self.phase,
            local_id: self.local_id.clone(),
            self_state: self.self_state.clone(),
            roster_version: self.others.version(),
            others: self.others.snapshot(),
            local_projectiles: Arc::clone(&self.local_projectiles),
            remote_projectiles: Arc::clone(&self.remote_projectiles),
        }
    }
}

/// What the renderer reads once per frame
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    pub version: u64,
    pub phase: ConnectionPhase,
    pub local_id: Option<PlayerId>,
    pub self_state: Option<SelfState>,
    pub roster_version: u64,
    pub others: Arc<HashMap<PlayerId, Player>>,
    pub local_projectiles: Arc<Vec<Projectile>>,
    pub remote_projectiles: Arc<Vec<RemoteProjectile>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, x: f32) -> Player {
        Player {
            id: PlayerId::from(id),
            name: id.to_lowercase(),
            character: None,
            position: Some(Vec2::new(x, x)),
            stats: None,
        }
    }

    #[test]
    fn roster_writes_do_not_disturb_held_snapshots() {
        let mut roster = Roster::default();
        roster.upsert(player("B", 1.0));
        let held = roster.snapshot();

        roster.upsert(player("C", 2.0));
        roster.remove(&PlayerId::from("B"));

        assert_eq!(held.len(), 1);
        assert!(held.contains_key(&PlayerId::from("B")));
        assert_eq!(roster.len(), 1);
        assert!(roster.contains(&PlayerId::from("C")));
    }

    #[test]
    fn roster_version_tracks_mutations_only() {
        let mut roster = Roster::default();
        assert_eq!(roster.version(), 0);
        roster.upsert(player("B", 1.0));
        assert_eq!(roster.version(), 1);
        assert!(roster.remove(&PlayerId::from("missing")).is_none());
        assert_eq!(roster.version(), 1);
        roster.replace(HashMap::new());
        assert_eq!(roster.version(), 2);
        assert!(roster.is_empty());
    }

    #[test]
    fn clear_resets_everything_to_disconnected() {
        let mut state = SessionState::new();
        state.phase = ConnectionPhase::Active;
        state.local_id = Some(PlayerId::from("A"));
        state.self_state = Some(SelfState::spawn("a".into(), None, Vec2::new(1.0, 1.0)));
        state.others.upsert(player("B", 1.0));
        state.departed.insert(PlayerId::from("C"));

        state.clear();

        assert_eq!(state.phase, ConnectionPhase::Disconnected);
        assert!(state.local_id.is_none());
        assert!(state.self_state.is_none());
        assert!(state.others.is_empty());
        assert!(state.departed.is_empty());
        assert!(state.local_projectiles.is_empty());
    }
}
