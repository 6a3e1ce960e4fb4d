//! Local projectile simulation and remote projectile merge

use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::Tuning;
use crate::ws::protocol::BulletPayload;
use crate::ws::{ClientEvent, SessionChannel};

use super::state::SessionState;
use super::tilemap::TileMap;
use super::{is_local, PlayerId, Vec2};

/// Projectile fired by the local player
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    /// Stable key for the renderer; never sent to the peer
    pub id: Uuid,
    pub position: Vec2,
    /// Displacement per tick
    pub velocity: Vec2,
}

impl Projectile {
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            velocity,
        }
    }
}

/// Projectile reported by the authoritative peer
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteProjectile {
    pub owner: Option<PlayerId>,
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Owns the lifecycle of local projectiles
#[derive(Debug, Clone, Copy)]
pub struct ProjectileSimulator {
    speed: f32,
    wall_culling: bool,
}

impl ProjectileSimulator {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            speed: tuning.bullet_speed,
            wall_culling: tuning.wall_culling,
        }
    }

    /// Fire from the current self position towards `aim`
    pub fn fire(
        &self,
        state: &mut SessionState,
        aim: Vec2,
        channel: &dyn SessionChannel,
    ) -> Option<Projectile> {
        if !state.is_active() {
            return None;
        }
        let origin = state.self_state.as_ref()?.position;

        let angle = origin.angle_to(aim);
        let projectile = Projectile::new(origin, Vec2::from_angle(angle, self.speed));

        Arc::make_mut(&mut state.local_projectiles).push(projectile.clone());
        debug!(
            x = origin.x,
            y = origin.y,
            angle,
            "Fired projectile"
        );
        channel.emit(ClientEvent::NewBullet(BulletPayload::from(&projectile)));
        Some(projectile)
    }

    /// Integrate every local projectile once, cull the ones that left the
    /// arena or hit a wall, then broadcast the survivors.
    ///
    /// Returns how many projectiles were culled.
    pub fn tick(
        &self,
        state: &mut SessionState,
        tiles: &TileMap,
        channel: &dyn SessionChannel,
    ) -> usize {
        if !state.is_active() {
            return 0;
        }

        let projectiles = Arc::make_mut(&mut state.local_projectiles);
        let before = projectiles.len();
        projectiles.retain_mut(|p| {
            p.position += p.velocity;
            self.survives(p.position, tiles)
        });
        let culled = before - projectiles.len();
        if culled > 0 {
            trace!(culled, remaining = projectiles.len(), "Culled projectiles");
        }

        let payload = projectiles.iter().map(BulletPayload::from).collect();
        channel.emit(ClientEvent::UpdateBullets(payload));
        culled
    }

    /// Replace the remote collection with `snapshot`, minus our own echoes
    pub fn merge_remote(&self, state: &mut SessionState, snapshot: Vec<RemoteProjectile>) {
        let remote: Vec<RemoteProjectile> = match &state.local_id {
            Some(local) => snapshot
                .into_iter()
                .filter(|p| !p.owner.as_ref().is_some_and(|owner| is_local(local, owner)))
                .collect(),
            None => snapshot,
        };
        state.remote_projectiles = Arc::new(remote);
    }

    fn survives(&self, position: Vec2, tiles: &TileMap) -> bool {
        let in_bounds = (0.0..=tiles.width()).contains(&position.x)
            && (0.0..=tiles.height()).contains(&position.y);
        in_bounds && (!self.wall_culling || tiles.is_walkable(position.x, position.y))
    }
}
