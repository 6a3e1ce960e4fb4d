//! Local movement prediction

use tracing::trace;

use crate::config::Tuning;
use crate::ws::{ClientEvent, SessionChannel};

use super::input::InputState;
use super::state::{PositionSource, SessionState};
use super::tilemap::TileMap;
use super::Vec2;

/// Advances the local player one fixed step per held key per tick.
///
/// Axes are resolved independently (vertical first) and diagonals are not
/// normalised, so a diagonal move covers `step` on both axes.
#[derive(Debug, Clone, Copy)]
pub struct MovementPredictor {
    step: f32,
    half_size: f32,
}

impl MovementPredictor {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            step: tuning.move_speed,
            half_size: tuning.half_player(),
        }
    }

    /// Compute the next position without touching any state
    pub fn resolve(&self, from: Vec2, input: InputState, tiles: &TileMap) -> Vec2 {
        let (min_y, max_y) = self.bounds(tiles.height());
        let mut y = from.y;
        if input.up {
            y = Self::step_axis(y, y - self.step, min_y, max_y, |c| tiles.is_walkable(from.x, c));
        }
        if input.down {
            y = Self::step_axis(y, y + self.step, min_y, max_y, |c| tiles.is_walkable(from.x, c));
        }

        let (min_x, max_x) = self.bounds(tiles.width());
        let mut x = from.x;
        if input.left {
            x = Self::step_axis(x, x - self.step, min_x, max_x, |c| tiles.is_walkable(c, y));
        }
        if input.right {
            x = Self::step_axis(x, x + self.step, min_x, max_x, |c| tiles.is_walkable(c, y));
        }

        Vec2::new(x, y)
    }

    /// Run one movement tick against the session.
    ///
    /// Returns the new provisional position when the player moved.
    pub fn tick(
        &self,
        state: &mut SessionState,
        input: InputState,
        tiles: &TileMap,
        channel: &dyn SessionChannel,
    ) -> Option<Vec2> {
        if !state.is_active() {
            return None;
        }
        let me = state.self_state.as_mut()?;

        let next = self.resolve(me.position, input, tiles);
        if next == me.position {
            return None;
        }

        me.position = next;
        me.source = PositionSource::Predicted;
        trace!(x = next.x, y = next.y, "Predicted move");
        channel.emit(ClientEvent::UpdatePosition(next));
        Some(next)
    }

    fn bounds(&self, extent: f32) -> (f32, f32) {
        let min = self.half_size;
        (min, (extent - self.half_size).max(min))
    }

    /// Clamp the candidate to the bounds, then keep it only if it lands on floor
    fn step_axis(
        current: f32,
        candidate: f32,
        min: f32,
        max: f32,
        walkable: impl Fn(f32) -> bool,
    ) -> f32 {
        let candidate = candidate.clamp(min, max);
        if walkable(candidate) {
            candidate
        } else {
            current
        }
    }
}
