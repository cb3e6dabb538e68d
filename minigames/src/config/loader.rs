//! Configuration loader.
//!
//! Loading pipeline:
//! 1. Size check and raw read (BOM stripped)
//! 2. Environment variable expansion on the raw text
//! 3. YAML parsing into `HostConfig`
//! 4. Question file resolution relative to the config directory
//! 5. Validation (all issues collected)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use minigames_core::config::{GameRules, HostConfig, QuestionSource};

use crate::error::ConfigError;

use super::questions::resolve_questions;
use super::validation::Validator;

// ============================================================================
// Public API
// ============================================================================

/// Limits applied while loading, to bound resource usage.
///
/// Each limit can be overridden through a `MINIGAMES_*` environment
/// variable.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum configuration file size in bytes.
    pub max_config_size: usize,

    /// Maximum question file size in bytes.
    pub max_question_file_size: usize,

    /// Maximum number of boot sessions.
    pub max_games: usize,

    /// Maximum roster size per session.
    pub max_participants: usize,

    /// Maximum bridge length in segments.
    pub max_segments: u32,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_config_size: env_or("MINIGAMES_MAX_CONFIG_SIZE", 1024 * 1024),
            max_question_file_size: env_or("MINIGAMES_MAX_QUESTION_FILE_SIZE", 4 * 1024 * 1024),
            max_games: env_or("MINIGAMES_MAX_GAMES", 256),
            max_participants: env_or("MINIGAMES_MAX_PARTICIPANTS", 1000),
            max_segments: env_or("MINIGAMES_MAX_SEGMENTS", 1000),
        }
    }
}

/// A loaded, validated configuration.
#[derive(Debug)]
pub struct LoadResult {
    /// The validated configuration.
    pub config: Arc<HostConfig>,

    /// Directory the config was loaded from; relative question paths
    /// resolve against it.
    pub base_dir: PathBuf,

    /// Non-fatal findings.
    pub warnings: Vec<LoadWarning>,
}

/// Warning raised while loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Where it was found.
    pub location: Option<String>,
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    limits: ConfigLimits,
}

impl ConfigLoader {
    /// Creates a loader with the given limits.
    #[must_use]
    pub const fn new(limits: ConfigLimits) -> Self {
        Self { limits }
    }

    /// Limits in effect.
    #[must_use]
    pub const fn limits(&self) -> &ConfigLimits {
        &self.limits
    }

    /// Loads, resolves and validates a host configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or exceeds the size limit
    /// - An environment variable marked required is unset
    /// - YAML parsing fails
    /// - A referenced question file is missing or malformed
    /// - Validation reports errors
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > self.limits.max_config_size {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {} bytes", self.limits.max_config_size),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

        let mut env_sub = EnvSubstitution::new();
        let substituted = env_sub.substitute(raw, path)?;
        warnings.extend(env_sub.warnings);

        let config = parse_config(&substituted, path)?;
        let base_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let mut validator = Validator::new();
        let mut result = validator.validate(&config, &self.limits);

        // Question files are only checked once the structure is sound.
        if !result.has_errors() {
            for (idx, spec) in config.games.iter().enumerate() {
                let GameRules::Reaction(rules) = &spec.setup.game else {
                    continue;
                };
                match resolve_questions(&rules.questions, &base_dir, &self.limits) {
                    Ok(pool) if pool.is_empty() => {
                        result.push_error(
                            &format!("games[{idx}].game.questions"),
                            "question pool is empty",
                        );
                    }
                    Ok(_) => {}
                    Err(e) if matches!(rules.questions, QuestionSource::File(_)) => {
                        result.push_error(&format!("games[{idx}].game.questions.file"), &e.to_string());
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result.errors,
            });
        }

        for issue in result.warnings {
            warnings.push(LoadWarning {
                message: issue.message,
                location: Some(issue.path),
            });
        }

        Ok(LoadResult {
            config: Arc::new(config),
            base_dir,
            warnings,
        })
    }
}

/// Parses substituted YAML text.
///
/// An empty document is an idle host.
///
/// # Errors
///
/// Returns `ConfigError::ParseError` with the line when available.
pub fn parse_config(text: &str, path: &Path) -> Result<HostConfig, ConfigError> {
    if text.trim().is_empty() {
        return Ok(HostConfig::default());
    }
    serde_yaml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        line: e.location().map(|l| l.line()),
        message: e.to_string(),
    })
}

// ============================================================================
// Environment Variable Substitution
// ============================================================================

/// Pre-parse environment variable substitution.
///
/// Runs on raw YAML text before parsing so substituted values keep their
/// YAML type inference.
struct EnvSubstitution {
    warnings: Vec<LoadWarning>,
}

impl EnvSubstitution {
    const fn new() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    /// Supports:
    /// - `${VAR}`: value, or empty string with a warning if unset
    /// - `${VAR:-default}`: `default` if unset
    /// - `${VAR:?message}`: fail if unset
    /// - `$$`: literal `$`
    fn substitute(&mut self, raw_yaml: &str, source_path: &Path) -> Result<String, ConfigError> {
        let mut result = String::with_capacity(raw_yaml.len());
        let mut chars = raw_yaml.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();
                    let spec = Self::parse_var_spec(&mut chars, source_path)?;
                    match std::env::var(&spec.name) {
                        Ok(value) => result.push_str(&value),
                        Err(_) => match spec.fallback {
                            Fallback::Default(value) => result.push_str(&value),
                            Fallback::Required(message) => {
                                return Err(ConfigError::EnvVarNotSet {
                                    var: spec.name,
                                    location: if message.is_empty() {
                                        source_path.display().to_string()
                                    } else {
                                        message
                                    },
                                });
                            }
                            Fallback::Empty => self.warnings.push(LoadWarning {
                                message: format!(
                                    "environment variable '{}' is not set, using empty string",
                                    spec.name
                                ),
                                location: Some(source_path.display().to_string()),
                            }),
                        },
                    }
                }
                _ => result.push(c),
            }
        }

        Ok(result)
    }

    fn parse_var_spec(
        chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
        source_path: &Path,
    ) -> Result<VarSpec, ConfigError> {
        let mut name = String::new();

        while let Some(c) = chars.next() {
            match c {
                '}' => {
                    return Ok(VarSpec {
                        name,
                        fallback: Fallback::Empty,
                    });
                }
                ':' if chars.peek() == Some(&'-') => {
                    chars.next();
                    let value = Self::read_until_close(chars, source_path)?;
                    return Ok(VarSpec {
                        name,
                        fallback: Fallback::Default(value),
                    });
                }
                ':' if chars.peek() == Some(&'?') => {
                    chars.next();
                    let message = Self::read_until_close(chars, source_path)?;
                    return Ok(VarSpec {
                        name,
                        fallback: Fallback::Required(message),
                    });
                }
                _ => name.push(c),
            }
        }

        Err(unclosed(source_path, &name))
    }

    /// Reads up to the matching `}`, allowing nested braces.
    fn read_until_close(
        chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
        source_path: &Path,
    ) -> Result<String, ConfigError> {
        let mut value = String::new();
        let mut depth = 1usize;

        for c in chars.by_ref() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(value);
                    }
                }
                _ => {}
            }
            value.push(c);
        }

        Err(unclosed(source_path, &value))
    }
}

struct VarSpec {
    name: String,
    fallback: Fallback,
}

enum Fallback {
    Empty,
    Default(String),
    Required(String),
}

fn unclosed(source_path: &Path, fragment: &str) -> ConfigError {
    ConfigError::ParseError {
        path: source_path.to_path_buf(),
        line: None,
        message: format!("unclosed environment variable reference: ${{{fragment}"),
    }
}

/// Parses an environment variable with a default value.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, yaml: &str) -> PathBuf {
        let path = dir.join("host.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_env_substitution_simple() {
        let mut sub = EnvSubstitution::new();
        let result = sub
            .substitute("path: ${PATH}", Path::new("test.yaml"))
            .unwrap();
        assert!(!result.contains("${PATH}"));
        assert!(result.len() > "path: ".len());
    }

    #[test]
    fn test_env_substitution_default() {
        let mut sub = EnvSubstitution::new();
        let result = sub
            .substitute(
                "channel: ${MINIGAMES_TEST_UNSET_CHANNEL_Q7:-lobby}",
                Path::new("test.yaml"),
            )
            .unwrap();
        assert_eq!(result, "channel: lobby");
    }

    #[test]
    fn test_env_substitution_required_missing() {
        let mut sub = EnvSubstitution::new();
        let result = sub.substitute(
            "seed: ${MINIGAMES_TEST_REQUIRED_SEED_Q7:?seed must be set}",
            Path::new("test.yaml"),
        );
        match result {
            Err(ConfigError::EnvVarNotSet { var, location }) => {
                assert_eq!(var, "MINIGAMES_TEST_REQUIRED_SEED_Q7");
                assert_eq!(location, "seed must be set");
            }
            other => panic!("expected EnvVarNotSet, got {other:?}"),
        }
    }

    #[test]
    fn test_env_substitution_escaped_dollar() {
        let mut sub = EnvSubstitution::new();
        let result = sub
            .substitute("prompt: $$100 question", Path::new("test.yaml"))
            .unwrap();
        assert_eq!(result, "prompt: $100 question");
    }

    #[test]
    fn test_env_substitution_missing_warning() {
        let mut sub = EnvSubstitution::new();
        let result = sub
            .substitute("role: ${MINIGAMES_TEST_WARN_ROLE_Q7}", Path::new("test.yaml"))
            .unwrap();
        assert_eq!(result, "role: ");
        assert_eq!(sub.warnings.len(), 1);
        assert!(sub.warnings[0].message.contains("MINIGAMES_TEST_WARN_ROLE_Q7"));
    }

    #[test]
    fn test_env_substitution_unclosed() {
        let mut sub = EnvSubstitution::new();
        assert!(sub.substitute("x: ${OOPS", Path::new("t.yaml")).is_err());
    }

    #[test]
    fn test_load_resolves_question_file_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quiz.txt"), "Sky?-blue\n").unwrap();
        let path = write_config(
            dir.path(),
            r"
host:
  moderators: [mod]
games:
  - channel: quiz
    participants: [alice, bob]
    game:
      type: reaction
      min_correct: 1
      questions:
        file: quiz.txt
",
        );
        let loaded = ConfigLoader::default().load(&path).unwrap();
        assert_eq!(loaded.config.games.len(), 1);
        assert_eq!(loaded.base_dir, dir.path());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_load_reports_missing_question_file_as_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r"
host:
  moderators: [mod]
games:
  - channel: quiz
    participants: [alice]
    game:
      type: reaction
      questions:
        file: missing.txt
",
        );
        let err = ConfigLoader::default().load(&path).unwrap_err();
        let ConfigError::ValidationError { errors, .. } = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 1);
        assert!(errors[0].path.ends_with("questions.file"));
    }

    #[test]
    fn test_load_empty_file_is_idle_host() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "");
        let loaded = ConfigLoader::default().load(&path).unwrap();
        assert!(loaded.config.games.is_empty());
        // no moderators configured
        assert_eq!(loaded.warnings.len(), 1);
    }

    #[test]
    fn test_load_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "host:\n  moderators: [unterminated\n");
        let err = ConfigLoader::default().load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_load_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), &"# filler\n".repeat(64));
        let loader = ConfigLoader::new(ConfigLimits {
            max_config_size: 32,
            ..ConfigLimits::default()
        });
        assert!(matches!(
            loader.load(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigLoader::default()
            .load(Path::new("/definitely/not/here.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }
}
