//! Gamification engine for the recruiting platform: XP and levels,
//! monthly points, badges and the façade that ties them to storage.

pub mod badges;
pub mod cache;
pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod leveling;
pub mod points;
pub mod profile;
pub mod state;
pub mod store;
pub mod types;

pub use engine::GamificationEngine;
pub use error::{GameError, GameResult};
