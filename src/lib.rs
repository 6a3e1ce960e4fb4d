//! Arena Client Core - client-side simulation for a multiplayer arena shooter
//!
//! The session task owns all game state. It predicts local movement, simulates
//! the local player's projectiles, and reconciles both against the authoritative
//! event stream delivered over the websocket transport.

pub mod config;
pub mod game;
pub mod util;
pub mod ws;
