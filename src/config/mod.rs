//! Configuration module - environment variable parsing

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::game::tilemap::{TileMap, TileMapError};
use crate::util::time::TICK_MILLIS;

/// Simulation constants shared by the movement and projectile loops
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    /// Period of both simulation timers in milliseconds
    pub tick_millis: u64,
    /// Distance moved per axis per movement tick
    pub move_speed: f32,
    /// Magnitude of a fired projectile's velocity (units per tick)
    pub bullet_speed: f32,
    /// Player diameter; half of it keeps the player off the map edge
    pub player_size: f32,
    /// Discard projectiles that land on a wall cell, not only off-map ones
    pub wall_culling: bool,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            tick_millis: TICK_MILLIS,
            move_speed: 5.0,
            bullet_speed: 5.0,
            player_size: 30.0,
            wall_culling: true,
        }
    }
}

impl Tuning {
    pub fn half_player(&self) -> f32 {
        self.player_size / 2.0
    }
}

/// Where the arena layout comes from
#[derive(Debug, Clone, PartialEq)]
pub enum MapSource {
    /// ASCII layout file (`#` wall, `.` floor)
    File(PathBuf),
    /// Seeded square arena; the border ring is only walled on request
    Generated {
        seed: u64,
        size: f32,
        wall_density: f64,
        walled: bool,
    },
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Websocket URL of the authoritative peer
    pub server_url: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Display name submitted on join
    pub player_name: String,
    /// Optional character/skin selector
    pub character: Option<String>,

    pub map: MapSource,
    pub cell_size: f32,
    pub tuning: Tuning,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Tuning::default();

        let map = match env::var("ARENA_MAP_FILE") {
            Ok(path) if !path.trim().is_empty() => MapSource::File(PathBuf::from(path)),
            _ => MapSource::Generated {
                seed: parse_var("ARENA_MAP_SEED", 0)?,
                size: parse_var("ARENA_MAP_SIZE", 2000.0)?,
                wall_density: parse_var("ARENA_WALL_DENSITY", 0.0)?,
                walled: parse_var("ARENA_MAP_WALLED", false)?,
            },
        };

        Ok(Self {
            server_url: env::var("ARENA_SERVER_URL")
                .unwrap_or_else(|_| "ws://127.0.0.1:3001/ws".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            player_name: env::var("PLAYER_NAME").unwrap_or_else(|_| "player".to_string()),
            character: env::var("PLAYER_CHARACTER")
                .ok()
                .filter(|c| !c.trim().is_empty()),

            map,
            cell_size: parse_var("ARENA_CELL_SIZE", 50.0)?,
            tuning: Tuning {
                tick_millis: parse_var("ARENA_TICK_MS", defaults.tick_millis)?,
                move_speed: parse_var("ARENA_MOVE_SPEED", defaults.move_speed)?,
                bullet_speed: parse_var("ARENA_BULLET_SPEED", defaults.bullet_speed)?,
                player_size: parse_var("ARENA_PLAYER_SIZE", defaults.player_size)?,
                wall_culling: parse_var("ARENA_WALL_CULLING", defaults.wall_culling)?,
            },
        })
    }

    /// Build the arena grid described by this configuration
    pub fn build_tile_map(&self) -> Result<TileMap, ConfigError> {
        let tiles = match &self.map {
            MapSource::File(path) => TileMap::load(path, self.cell_size)?,
            MapSource::Generated {
                seed,
                size,
                wall_density,
                walled,
            } => {
                let cells = (size / self.cell_size).ceil().max(1.0) as usize;
                TileMap::generate(cells, cells, self.cell_size, *seed, *wall_density, *walled)?
            }
        };
        Ok(tiles)
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid arena map: {0}")]
    InvalidMap(#[from] TileMapError),
}
