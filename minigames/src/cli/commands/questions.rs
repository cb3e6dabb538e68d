//! `questions` command: parse a question file and print the pool.

use crate::cli::args::{OutputFormat, QuestionsArgs};
use crate::config::{ConfigLimits, load_question_file};
use crate::error::MinigamesError;

/// Parse `args.file` and print the deduplicated questions.
///
/// # Errors
///
/// Returns a config error if the file is missing, too large or malformed.
pub fn run(args: &QuestionsArgs) -> Result<(), MinigamesError> {
    let questions = load_question_file(&args.file, &ConfigLimits::default())?;
    tracing::info!(file = %args.file.display(), count = questions.len(), "question file parsed");

    match args.format {
        OutputFormat::Human => {
            println!("{}: {} question(s)", args.file.display(), questions.len());
            for (i, question) in questions.iter().enumerate() {
                println!("{:>4}. {} -> {}", i + 1, question.prompt, question.revealed_answer());
                for (label, choice) in ('A'..='Z').zip(&question.choices) {
                    println!("        {label}) {choice}");
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&questions)?);
        }
    }
    Ok(())
}
