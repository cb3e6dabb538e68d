//! Host configuration schema.

pub mod schema;

pub use schema::{
    BridgeRules, GameRules, GameSetup, GameSpec, HostConfig, HostSettings, Question, QuestionSource,
    ReactionRules, RoleSettings,
};
