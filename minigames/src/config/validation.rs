//! Configuration validation.
//!
//! Runs on the deserialized `HostConfig` and collects every issue rather
//! than stopping at the first one. Rules are the same ones the engines
//! enforce at session creation, so a config that validates can always be
//! started.

use std::collections::HashSet;
use std::time::Duration;

use minigames_core::config::{GameRules, GameSetup, HostConfig, QuestionSource};

use crate::error::{Severity, ValidationIssue};

use super::loader::ConfigLimits;

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Appends an error found after the validator ran.
    pub fn push_error(&mut self, path: &str, message: &str) {
        self.errors.push(issue(path, message, Severity::Error));
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a host configuration.
    pub fn validate(&mut self, config: &HostConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_host(config);

        if config.games.len() > limits.max_games {
            self.add_error(
                "games",
                &format!(
                    "{} games configured, at most {} allowed",
                    config.games.len(),
                    limits.max_games
                ),
            );
        }

        let mut channels = HashSet::new();
        for (idx, spec) in config.games.iter().enumerate() {
            let path = format!("games[{idx}]");
            if spec.channel.as_str().trim().is_empty() {
                self.add_error(&format!("{path}.channel"), "channel cannot be empty");
            } else if !channels.insert(&spec.channel) {
                self.add_error(
                    &format!("{path}.channel"),
                    &format!(
                        "channel '{}' already has a game; one session per channel",
                        spec.channel
                    ),
                );
            }
            self.validate_setup(&spec.setup, &path, limits);
        }

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    /// Validates a setup on its own, as carried by a `start` command.
    pub fn validate_setup_only(&mut self, setup: &GameSetup, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();
        self.validate_setup(setup, "game", limits);
        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Host
    // ========================================================================

    fn validate_host(&mut self, config: &HostConfig) {
        if config.host.moderators.is_empty() {
            self.add_warning(
                "host.moderators",
                "no moderators configured; games can only be started from the config",
            );
        }
        if config.host.afk_sweep_interval.is_zero() {
            self.add_error("host.afk_sweep_interval", "sweep interval must be positive");
        }
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    fn validate_setup(&mut self, setup: &GameSetup, path: &str, limits: &ConfigLimits) {
        if setup.participants.is_empty() {
            self.add_error(
                &format!("{path}.participants"),
                "at least one participant is required",
            );
        }
        if setup.participants.len() > limits.max_participants {
            self.add_error(
                &format!("{path}.participants"),
                &format!(
                    "{} participants, at most {} allowed",
                    setup.participants.len(),
                    limits.max_participants
                ),
            );
        }
        let mut seen = HashSet::new();
        for (idx, participant) in setup.participants.iter().enumerate() {
            if !seen.insert(participant) {
                self.add_error(
                    &format!("{path}.participants[{idx}]"),
                    &format!("duplicate participant '{participant}'"),
                );
            }
        }

        self.validate_duration(setup.time_limit, &format!("{path}.time_limit"));

        if let (Some(winner), Some(loser)) = (&setup.roles.winner, &setup.roles.loser) {
            if winner == loser {
                self.add_error(
                    &format!("{path}.roles"),
                    "winner and loser roles must differ",
                );
            }
        }

        match &setup.game {
            GameRules::Bridge(rules) => {
                if rules.segments == 0 {
                    self.add_error(
                        &format!("{path}.game.segments"),
                        "a bridge needs at least one segment",
                    );
                } else if rules.segments > limits.max_segments {
                    self.add_error(
                        &format!("{path}.game.segments"),
                        &format!(
                            "{} segments exceeds the limit of {}",
                            rules.segments, limits.max_segments
                        ),
                    );
                }
                if rules.positions < 2 {
                    self.add_error(
                        &format!("{path}.game.positions"),
                        "a segment needs at least two panels",
                    );
                }
            }
            GameRules::Reaction(rules) => {
                if rules.min_correct == 0 {
                    self.add_error(
                        &format!("{path}.game.min_correct"),
                        "min_correct must be at least 1",
                    );
                }
                self.validate_duration(rules.cooldown, &format!("{path}.game.cooldown"));
                self.validate_duration(rules.afk, &format!("{path}.game.afk"));
                if rules.afk < setup.time_limit / 10 {
                    self.add_warning(
                        &format!("{path}.game.afk"),
                        "AFK window is very short compared to the time limit",
                    );
                }
                match &rules.questions {
                    QuestionSource::Inline(questions) => {
                        if questions.is_empty() {
                            self.add_error(
                                &format!("{path}.game.questions"),
                                "question pool is empty",
                            );
                        }
                        for (idx, q) in questions.iter().enumerate() {
                            if q.prompt.trim().is_empty() || q.answer.trim().is_empty() {
                                self.add_error(
                                    &format!("{path}.game.questions.inline[{idx}]"),
                                    "question needs a prompt and an answer",
                                );
                            }
                        }
                    }
                    QuestionSource::File(file) => {
                        if file.as_os_str().is_empty() {
                            self.add_error(
                                &format!("{path}.game.questions.file"),
                                "question file path is empty",
                            );
                        }
                    }
                }
            }
        }
    }

    fn validate_duration(&mut self, value: Duration, path: &str) {
        if value.is_zero() {
            self.add_error(path, "duration must be positive");
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(issue(path, message, Severity::Error));
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(issue(path, message, Severity::Warning));
    }
}

fn issue(path: &str, message: &str, severity: Severity) -> ValidationIssue {
    ValidationIssue {
        path: path.to_string(),
        message: message.to_string(),
        severity,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use minigames_core::config::{BridgeRules, GameSpec, HostSettings, Question, ReactionRules, RoleSettings};
    use crate::types::{ChannelId, ParticipantId};

    fn limits() -> ConfigLimits {
        ConfigLimits::default()
    }

    fn setup(game: GameRules) -> GameSetup {
        GameSetup {
            participants: vec![ParticipantId::from("alice"), ParticipantId::from("bob")],
            time_limit: Duration::from_secs(300),
            shuffle: true,
            seed: None,
            roles: RoleSettings::default(),
            game,
        }
    }

    fn bridge(segments: u32, positions: u8) -> GameRules {
        GameRules::Bridge(BridgeRules {
            segments,
            positions,
        })
    }

    fn reaction(min_correct: u32, questions: Vec<Question>) -> GameRules {
        GameRules::Reaction(ReactionRules {
            min_correct,
            cooldown: ReactionRules::DEFAULT_COOLDOWN,
            afk: ReactionRules::DEFAULT_AFK,
            questions: QuestionSource::Inline(questions),
        })
    }

    fn config(games: Vec<GameSpec>) -> HostConfig {
        HostConfig {
            host: HostSettings {
                moderators: vec![ParticipantId::from("mod")],
                ..HostSettings::default()
            },
            games,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let cfg = config(vec![
            setup(bridge(3, 4)).into_spec(ChannelId::from("a")),
            setup(reaction(2, vec![Question::new("q", "a")])).into_spec(ChannelId::from("b")),
        ]);
        let result = Validator::new().validate(&cfg, &limits());
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_collects_every_issue() {
        let mut bad = setup(bridge(0, 1));
        bad.participants.push(ParticipantId::from("alice"));
        bad.time_limit = Duration::ZERO;
        bad.roles = RoleSettings {
            winner: Some("same".into()),
            loser: Some("same".into()),
        };
        let cfg = config(vec![
            bad.into_spec(ChannelId::from("dup")),
            setup(reaction(0, Vec::new())).into_spec(ChannelId::from("dup")),
        ]);

        let result = Validator::new().validate(&cfg, &limits());
        let paths: Vec<&str> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"games[0].participants[2]"));
        assert!(paths.contains(&"games[0].time_limit"));
        assert!(paths.contains(&"games[0].roles"));
        assert!(paths.contains(&"games[0].game.segments"));
        assert!(paths.contains(&"games[0].game.positions"));
        assert!(paths.contains(&"games[1].channel"));
        assert!(paths.contains(&"games[1].game.min_correct"));
        assert!(paths.contains(&"games[1].game.questions"));
        assert_eq!(result.errors.len(), 8);
    }

    #[test]
    fn test_empty_roster_is_error() {
        let mut s = setup(bridge(1, 2));
        s.participants.clear();
        let result = Validator::new().validate_setup_only(&s, &limits());
        assert!(result.has_errors());
        assert_eq!(result.errors[0].path, "game.participants");
    }

    #[test]
    fn test_no_moderators_is_warning() {
        let result = Validator::new().validate(&HostConfig::default(), &limits());
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].severity, Severity::Warning);
    }

    #[test]
    fn test_roster_limit() {
        let tight = ConfigLimits {
            max_participants: 1,
            ..limits()
        };
        let result = Validator::new().validate_setup_only(&setup(bridge(1, 2)), &tight);
        assert!(result.has_errors());
    }

    #[test]
    fn test_segment_limit() {
        let limits = limits();
        let at_limit = setup(bridge(limits.max_segments, 2));
        assert!(Validator::new().validate_setup_only(&at_limit, &limits).is_valid());

        let result = Validator::new().validate_setup_only(&setup(bridge(u32::MAX, 2)), &limits);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "game.game.segments");
    }
}
