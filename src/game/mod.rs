//! Client-side game simulation modules

pub mod input;
pub mod movement;
pub mod projectile;
pub mod reconcile;
pub mod session;
pub mod state;
pub mod tilemap;

pub use movement::MovementPredictor;
pub use projectile::{Projectile, ProjectileSimulator, RemoteProjectile};
pub use reconcile::{JoinError, Reconciled, StateReconciler};
pub use session::{ClientSession, SessionHandle};
pub use state::{
    ConnectionPhase, Player, PositionSource, Roster, SelfState, SessionState, SessionView, Stats,
};
pub use tilemap::{Cell, TileMap};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scene-space vector (positions and per-tick velocities)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit direction at `angle` radians scaled to `magnitude`
    pub fn from_angle(angle: f32, magnitude: f32) -> Self {
        Self {
            x: angle.cos() * magnitude,
            y: angle.sin() * magnitude,
        }
    }

    /// Angle of the vector from `self` towards `target`
    pub fn angle_to(self, target: Vec2) -> f32 {
        (target.y - self.y).atan2(target.x - self.x)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

/// Opaque session id assigned by the authoritative peer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity check against the local session id.
///
/// Every "is this mine" decision (roster self-exclusion, projectile echo
/// filtering) goes through here with the local id passed in explicitly.
pub fn is_local(local: &PlayerId, candidate: &PlayerId) -> bool {
    local == candidate
}
