//! Host configuration.
//!
//! Schema types live in `minigames-core`; this module adds loading, env
//! substitution, question files and validation.

pub mod loader;
pub mod questions;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning, parse_config};
pub use minigames_core::config::*;
pub use questions::{load_question_file, parse_questions, resolve_questions};
pub use validation::{ValidationResult, Validator};
