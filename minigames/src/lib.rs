//! `minigames` - host for channel-based elimination minigames
//!
//! Runs turn-based bridge crossings and red light / green light quizzes
//! inside chat channels. The game engines are pure state machines; the
//! host feeds them events from an NDJSON transport and broadcasts the
//! resulting changes.

pub mod broadcast;
pub mod cli;
pub mod config;
pub mod error;
pub mod game;
pub mod host;
pub mod observability;
pub mod transport;

pub use minigames_core::types;
