//! Version information display.

use crate::cli::args::{OutputFormat, VersionArgs};

/// Print version information, including the supported games.
pub fn run(args: &VersionArgs) {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");
    let games = [
        crate::types::GameKind::Bridge.as_str(),
        crate::types::GameKind::Reaction.as_str(),
    ];

    match args.format {
        OutputFormat::Human => {
            println!("{name} {version} (games: {})", games.join(", "));
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "name": name, "version": version, "games": games })
            );
        }
    }
}
