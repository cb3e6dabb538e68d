//! Host command handlers
//!
//! Implements `host run` and `host validate`.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{HostRunArgs, HostValidateArgs, OutputFormat};
use crate::config::{ConfigLimits, ConfigLoader, LoadResult};
use crate::error::{ConfigError, MinigamesError};
use crate::host::{Host, HostOptions};
use crate::observability::EventEmitter;
use crate::transport::StdioTransport;

/// Start the host on stdin/stdout.
///
/// # Errors
///
/// Returns a config error if the configuration does not load, or a
/// transport error if reading stdin fails.
pub async fn run(args: &HostRunArgs, cancel: CancellationToken) -> Result<(), MinigamesError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    tracing::info!(config = %args.config.display(), "loading configuration");
    let loader = ConfigLoader::new(ConfigLimits::default());
    let LoadResult {
        config,
        base_dir,
        warnings,
    } = loader.load(&args.config)?;
    for warning in &warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }

    let event_emitter = if let Some(ref path) = args.events_file {
        EventEmitter::from_file(path)?
    } else {
        EventEmitter::stderr()
    };

    let host = Host::new(HostOptions {
        config,
        base_dir,
        transport: Arc::new(StdioTransport::new()),
        event_emitter: Arc::new(event_emitter),
        limits: loader.limits().clone(),
        cancel,
    });
    let stop = host.run().await?;
    tracing::info!(%stop, "host stopped");
    Ok(())
}

/// Validate configuration files without starting the host.
///
/// Every file is checked; the command fails if any of them does.
///
/// # Errors
///
/// Returns `ConfigError::ValidationFailed` with the number of failing
/// files.
pub fn validate(args: &HostValidateArgs) -> Result<(), MinigamesError> {
    let loader = ConfigLoader::new(ConfigLimits::default());
    let mut reports = Vec::with_capacity(args.files.len());
    let mut failed = 0;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let report = FileReport::check(&loader, path, args.strict);
        if !report.valid {
            failed += 1;
        }
        reports.push(report);
    }

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                report.print_human();
            }
        }
        OutputFormat::Json => {
            let value: Vec<_> = reports.iter().map(FileReport::to_json).collect();
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    if failed > 0 {
        return Err(ConfigError::ValidationFailed { count: failed }.into());
    }
    Ok(())
}

/// Outcome of validating one file.
struct FileReport {
    file: String,
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl FileReport {
    fn check(loader: &ConfigLoader, path: &Path, strict: bool) -> Self {
        let file = path.display().to_string();
        match loader.load(path) {
            Ok(result) => {
                let warnings: Vec<String> = result
                    .warnings
                    .iter()
                    .map(|w| match &w.location {
                        Some(location) => format!("{location}: {}", w.message),
                        None => w.message.clone(),
                    })
                    .collect();
                Self {
                    file,
                    valid: !(strict && !warnings.is_empty()),
                    errors: Vec::new(),
                    warnings,
                }
            }
            Err(ConfigError::ValidationError { errors, .. }) => Self {
                file,
                valid: false,
                errors: errors
                    .iter()
                    .map(|issue| format!("{} at {}", issue.message, issue.path))
                    .collect(),
                warnings: Vec::new(),
            },
            Err(e) => Self {
                file,
                valid: false,
                errors: vec![e.to_string()],
                warnings: Vec::new(),
            },
        }
    }

    fn print_human(&self) {
        if self.valid {
            println!("{}: ok", self.file);
        } else {
            println!("{}: invalid", self.file);
        }
        for error in &self.errors {
            println!("  error: {error}");
        }
        for warning in &self.warnings {
            println!("  warning: {warning}");
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "file": self.file,
            "valid": self.valid,
            "errors": self.errors,
            "warnings": self.warnings,
        })
    }
}
