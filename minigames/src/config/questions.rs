//! Question pool loading.
//!
//! Question files hold one question per line, fields separated by `-`:
//!
//! ```text
//! Capital of France?-B-Berlin||Paris||Rome
//! "Is 3-1 two?"-yes
//! ```
//!
//! Fields may be wrapped in double quotes to carry a literal `-` (a doubled
//! `""` inside quotes is a literal quote). The third field is optional and
//! holds `||`-separated choices. Prompts are deduplicated case-insensitively;
//! a later line replaces an earlier one but keeps its position.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use minigames_core::config::{Question, QuestionSource};

use crate::error::ConfigError;

use super::loader::ConfigLimits;

const FIELD_DELIMITER: char = '-';
const CHOICE_SEPARATOR: &str = "||";

/// Parses question-file text.
///
/// `path` is only used for error reporting.
///
/// # Errors
///
/// Returns `ConfigError::ParseError` with the 1-based line number when a
/// line has no answer or an unterminated quote.
pub fn parse_questions(text: &str, path: &Path) -> Result<Vec<Question>, ConfigError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut pool: IndexMap<String, Question> = IndexMap::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let fields = split_fields(raw).ok_or_else(|| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: Some(line_no),
            message: "unterminated quote".to_string(),
        })?;

        let mut fields = fields.into_iter();
        let prompt = fields.next().unwrap_or_default().trim().to_string();
        let answer = fields.next().unwrap_or_default().trim().to_string();
        if prompt.is_empty() || answer.is_empty() {
            return Err(ConfigError::ParseError {
                path: path.to_path_buf(),
                line: Some(line_no),
                message: "expected 'question-answer[-choices]'".to_string(),
            });
        }
        let choices = fields
            .next()
            .map(|c| parse_choices(&c))
            .unwrap_or_default();

        let question = Question::new(prompt, answer).with_choices(choices);
        // insert keeps the original slot for an existing key
        pool.insert(question.prompt.to_lowercase(), question);
    }

    Ok(pool.into_values().collect())
}

/// Reads and parses a question file, enforcing the size limit.
///
/// # Errors
///
/// Returns `ConfigError::MissingFile` if the file cannot be read,
/// `ConfigError::InvalidValue` if it is too large, or a parse error.
pub fn load_question_file(path: &Path, limits: &ConfigLimits) -> Result<Vec<Question>, ConfigError> {
    let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
        path: path.to_path_buf(),
    })?;
    let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
    if size > limits.max_question_file_size {
        return Err(ConfigError::InvalidValue {
            field: "questions.file".to_string(),
            value: format!("{size} bytes"),
            expected: format!("at most {} bytes", limits.max_question_file_size),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
        path: path.to_path_buf(),
    })?;
    let questions = parse_questions(&text, path)?;
    tracing::debug!(path = %path.display(), count = questions.len(), "question file loaded");
    Ok(questions)
}

/// Materializes a question source.
///
/// Relative file paths are resolved against `base_dir` (the directory of
/// the host config).
///
/// # Errors
///
/// Propagates file loading and parse errors.
pub fn resolve_questions(
    source: &QuestionSource,
    base_dir: &Path,
    limits: &ConfigLimits,
) -> Result<Vec<Question>, ConfigError> {
    match source {
        QuestionSource::Inline(questions) => Ok(questions.clone()),
        QuestionSource::File(path) => load_question_file(&resolve_path(path, base_dir), limits),
    }
}

/// Joins a relative path onto `base_dir`; absolute paths are kept.
#[must_use]
pub fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn parse_choices(field: &str) -> Vec<String> {
    field
        .split(CHOICE_SEPARATOR)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

/// Splits one line on `-`, honoring double-quoted fields.
///
/// Returns `None` on an unterminated quote.
fn split_fields(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            FIELD_DELIMITER if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if in_quotes {
        return None;
    }
    fields.push(current);
    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn parse(text: &str) -> Vec<Question> {
        parse_questions(text, Path::new("quiz.txt")).unwrap()
    }

    #[test]
    fn test_parse_basic_lines() {
        let pool = parse("Capital of France?-B-Berlin||Paris||Rome\n2+2?-4\n");
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[0].prompt, "Capital of France?");
        assert_eq!(pool[0].choices, vec!["Berlin", "Paris", "Rome"]);
        assert_eq!(pool[0].revealed_answer(), "B. Paris");
        assert!(pool[1].choices.is_empty());
    }

    #[test]
    fn test_duplicate_prompts_keep_position_take_last_value() {
        let pool = parse("First?-a\nSecond?-b\nfirst?-c\n");
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[0].prompt, "first?");
        assert_eq!(pool[0].answer, "c");
        assert_eq!(pool[1].prompt, "Second?");
    }

    #[test]
    fn test_quoted_field_keeps_dash() {
        let pool = parse("\"Is 3-1 two?\"-yes\n");
        assert_eq!(pool[0].prompt, "Is 3-1 two?");
        assert_eq!(pool[0].answer, "yes");
    }

    #[test]
    fn test_blank_lines_and_bom_skipped() {
        let pool = parse("\u{feff}\n  \nQ?-A\n\n");
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_missing_answer_reports_line() {
        let err = parse_questions("ok?-yes\nbroken line\n", Path::new("quiz.txt")).unwrap_err();
        match err {
            ConfigError::ParseError { line, .. } => assert_eq!(line, Some(2)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        assert!(parse_questions("\"open-ended-x\n", Path::new("q")).is_err());
    }

    #[test]
    fn test_resolve_relative_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("quiz.txt")).unwrap();
        writeln!(file, "Sky colour?-blue").unwrap();

        let source = QuestionSource::File(PathBuf::from("quiz.txt"));
        let pool = resolve_questions(&source, dir.path(), &ConfigLimits::default()).unwrap();
        assert_eq!(pool, vec![Question::new("Sky colour?", "blue")]);
    }

    #[test]
    fn test_missing_file() {
        let source = QuestionSource::File(PathBuf::from("nope.txt"));
        let err = resolve_questions(&source, Path::new("/nonexistent"), &ConfigLimits::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "Q?-A\n".repeat(100)).unwrap();
        let limits = ConfigLimits {
            max_question_file_size: 16,
            ..ConfigLimits::default()
        };
        let err = load_question_file(&path, &limits).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
