//! `minigames-core` - shared types and configuration schema
//!
//! This crate provides the identifier types, configuration schema and
//! configuration error types shared by the `minigames` host and its fuzz
//! targets.

pub mod config;
pub mod error;
pub mod types;
