//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::ImportSettings;
use crate::decode::read_records;
use crate::engine::{format_duration, ImportEngine, ImportReport, ResumePrompt, ShutdownFlag};
use crate::error::{Error, Result};
use crate::http::SubmitClient;
use crate::normalize::{normalize_records, write_csv, write_template, NormalizedRecord};
use crate::state::Checkpoint;
use crate::validate::ValidationReport;
use serde_json::json;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Process exit code for success
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit code for validation errors or a failed run
pub const EXIT_FAILURE: i32 = 1;
/// Process exit code for an import stopped by a signal
pub const EXIT_INTERRUPTED: i32 = 130;

/// Asks on the terminal whether to resume
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl ResumePrompt for StdinPrompt {
    fn should_resume(&self, checkpoint: &Checkpoint) -> bool {
        println!(
            "Found checkpoint from {}: batch {}/{}, {} imported, {} duplicates, {} errors",
            checkpoint.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            checkpoint.current_batch,
            checkpoint.total_batches,
            checkpoint.imported,
            checkpoint.duplicates,
            checkpoint.errors
        );
        print!("Resume? [Y/n] ");
        let _ = io::stdout().flush();

        let mut answer = String::new();
        if io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes")
    }
}

/// CLI runner
pub struct Runner {
    cli: Cli,
    shutdown: ShutdownFlag,
    env_overrides: HashMap<String, String>,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            shutdown: ShutdownFlag::new(),
            env_overrides: HashMap::new(),
        }
    }

    /// Share a shutdown flag with a signal handler
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownFlag) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Environment values taking precedence over the process environment
    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_overrides.insert(name.into(), value.into());
        self
    }

    /// Run the CLI command, returning the process exit code
    pub async fn run(&self) -> Result<i32> {
        match &self.cli.command {
            Commands::Validate {
                input,
                entities,
                skip_entity_check,
                report,
                max_examples,
            } => self.validate(
                input,
                entities.as_deref(),
                *skip_entity_check,
                report,
                *max_examples,
            ),
            Commands::Format { paths, template } => self.format(paths, *template),
            Commands::Import {
                input,
                resume,
                yes,
                entities,
                skip_entity_check,
                batch_size,
            } => {
                self.import(
                    input,
                    *resume,
                    *yes,
                    entities.as_deref(),
                    *skip_entity_check,
                    *batch_size,
                )
                .await
            }
            Commands::Status => self.status().await,
            Commands::ClearCheckpoint => self.clear_checkpoint().await,
        }
    }

    /// Load settings: file, then environment
    fn settings(&self) -> Result<ImportSettings> {
        let mut settings = ImportSettings::load(self.cli.config.as_deref())?;
        settings.apply_env();
        settings.apply_env_from(|name| self.env_overrides.get(name).cloned());
        Ok(settings)
    }

    /// Read and normalize an input file
    fn load_rows(&self, input: &Path) -> Result<Vec<NormalizedRecord>> {
        let raw = read_records(input)?;
        let rows = normalize_records(&raw);
        info!("Loaded {} rows from {}", rows.len(), input.display());
        Ok(rows)
    }

    fn validate(
        &self,
        input: &Path,
        entities: Option<&Path>,
        skip_entity_check: bool,
        report_path: &Path,
        max_examples: usize,
    ) -> Result<i32> {
        let mut settings = self.settings()?;
        if let Some(path) = entities {
            settings.validation.entities_path = Some(path.to_path_buf());
        }
        settings.validation.skip_entity_check |= skip_entity_check;

        let rows = self.load_rows(input)?;
        let validator = settings.validator()?;
        if !validator.checks_entities() {
            warn!("Entity check skipped; mkId existence and eligibility are not checked");
        }

        let results = validator.validate_all(&rows);
        let report = ValidationReport::from_rows(input.display().to_string(), &results);
        report.write_json(report_path)?;

        match self.cli.format {
            OutputFormat::Pretty => {
                print!("{}", report.summary(max_examples));
                println!("\nReport written to {}", report_path.display());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }

        Ok(if report.has_errors() {
            EXIT_FAILURE
        } else {
            EXIT_SUCCESS
        })
    }

    fn format(&self, paths: &[PathBuf], template: bool) -> Result<i32> {
        if template {
            let [output] = paths else {
                return Err(Error::config("format --template takes exactly one output path"));
            };
            write_template(output)?;
            self.output(
                &format!("Template written to {}", output.display()),
                &json!({ "template": output.display().to_string() }),
            );
            return Ok(EXIT_SUCCESS);
        }

        let [input, output] = paths else {
            return Err(Error::config("format takes an input and an output path"));
        };
        let rows = self.load_rows(input)?;
        write_csv(output, &rows)?;
        self.output(
            &format!("Wrote {} rows to {}", rows.len(), output.display()),
            &json!({ "rows": rows.len(), "output": output.display().to_string() }),
        );
        Ok(EXIT_SUCCESS)
    }

    async fn import(
        &self,
        input: &Path,
        resume: bool,
        yes: bool,
        entities: Option<&Path>,
        skip_entity_check: bool,
        batch_size: Option<usize>,
    ) -> Result<i32> {
        let mut settings = self.settings()?;
        if let Some(path) = entities {
            settings.validation.entities_path = Some(path.to_path_buf());
        }
        settings.validation.skip_entity_check |= skip_entity_check;
        if let Some(size) = batch_size {
            settings.import.batch_size = size;
        }
        settings.validate()?;

        let client = SubmitClient::new(settings.client_config()?)?;
        let rows = self.load_rows(input)?;
        let engine = ImportEngine::new(client, settings.checkpoint_store(), settings.validator()?)
            .with_config(settings.import_config(resume))
            .with_shutdown(self.shutdown.clone());

        let source = input.display().to_string();
        let report = if yes {
            engine
                .run(&source, &rows, &|_: &Checkpoint| true)
                .await?
        } else {
            engine.run(&source, &rows, &StdinPrompt).await?
        };

        self.output(&report.summary(), &report_json(&report));

        Ok(if report.is_complete() {
            EXIT_SUCCESS
        } else {
            EXIT_INTERRUPTED
        })
    }

    async fn status(&self) -> Result<i32> {
        let store = self.settings()?.checkpoint_store();
        let Some(checkpoint) = store.load().await? else {
            self.output(
                &format!("No checkpoint at {}", store.path().display()),
                &json!({ "checkpoint": null }),
            );
            return Ok(EXIT_SUCCESS);
        };

        let text = format!(
            "Checkpoint {}\n  Source:     {}\n  Saved:      {}\n  Batches:    {}/{}\n  Progress:   {}/{} rows ({:.1}%)\n  Imported:   {}\n  Duplicates: {}\n  Errors:     {}\n  Last URL:   {}\n",
            store.path().display(),
            checkpoint.source_file,
            checkpoint.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            checkpoint.current_batch,
            checkpoint.total_batches,
            checkpoint.rows_processed(),
            checkpoint.total_rows,
            checkpoint.progress_percent(),
            checkpoint.imported,
            checkpoint.duplicates,
            checkpoint.errors,
            checkpoint.last_successful_url.as_deref().unwrap_or("-"),
        );
        self.output(&text, &json!({ "checkpoint": checkpoint }));
        Ok(EXIT_SUCCESS)
    }

    async fn clear_checkpoint(&self) -> Result<i32> {
        let store = self.settings()?.checkpoint_store();
        let message = if store.delete().await? {
            format!("Deleted checkpoint {}", store.path().display())
        } else {
            format!("No checkpoint at {}", store.path().display())
        };
        self.output(&message, &json!({ "path": store.path().display().to_string() }));
        Ok(EXIT_SUCCESS)
    }

    /// Print text or JSON depending on the output format
    fn output(&self, text: &str, value: &serde_json::Value) {
        match self.cli.format {
            OutputFormat::Pretty => {
                if text.ends_with('\n') {
                    print!("{text}");
                } else {
                    println!("{text}");
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(value).unwrap_or_default());
            }
        }
    }
}

fn report_json(report: &ImportReport) -> serde_json::Value {
    json!({
        "outcome": if report.is_complete() { "completed" } else { "interrupted" },
        "sourceFile": report.source_file,
        "totalRows": report.total_rows,
        "totalBatches": report.total_batches,
        "batchesCompleted": report.batches_completed,
        "resumedFrom": report.resumed_from,
        "imported": report.imported,
        "duplicates": report.duplicates,
        "errors": report.errors,
        "skipped": report.skipped,
        "elapsed": format_duration(report.elapsed),
        "throughput": report.throughput(),
    })
}
