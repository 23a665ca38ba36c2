//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Historical comment importer
#[derive(Parser, Debug)]
#[command(name = "knesset-import")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate an input file and write a JSON report
    Validate {
        /// Input file (.csv, .tsv or .json)
        input: PathBuf,

        /// Entity snapshot (JSON) for mkId checks
        #[arg(short, long)]
        entities: Option<PathBuf>,

        /// Run without an entity snapshot (mkId existence and eligibility unchecked)
        #[arg(long, conflicts_with = "entities")]
        skip_entity_check: bool,

        /// Where to write the JSON report
        #[arg(short, long, default_value = "validation-report.json")]
        report: PathBuf,

        /// Errors listed in the console summary
        #[arg(long, default_value = "10")]
        max_examples: usize,
    },

    /// Rewrite an input file as canonical CSV, or write an empty template
    ///
    /// `format <input> <output>` or `format --template <output>`
    Format {
        /// Input and output paths (output only with --template)
        #[arg(num_args = 1..=2, required = true)]
        paths: Vec<PathBuf>,

        /// Write a template instead of converting a file
        #[arg(long)]
        template: bool,
    },

    /// Submit an input file to the API
    Import {
        /// Input file (.csv, .tsv or .json)
        input: PathBuf,

        /// Resume from an existing checkpoint
        #[arg(long)]
        resume: bool,

        /// Resume without asking
        #[arg(short, long)]
        yes: bool,

        /// Entity snapshot (JSON) for mkId checks
        #[arg(short, long)]
        entities: Option<PathBuf>,

        /// Run without an entity snapshot (mkId existence and eligibility unchecked)
        #[arg(long, conflicts_with = "entities")]
        skip_entity_check: bool,

        /// Rows per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Show the saved checkpoint, if any
    Status,

    /// Delete the saved checkpoint
    ClearCheckpoint,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Pretty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import() {
        let cli = Cli::parse_from([
            "knesset-import",
            "import",
            "comments.csv",
            "--resume",
            "-y",
            "--batch-size",
            "50",
        ]);

        match cli.command {
            Commands::Import {
                input,
                resume,
                yes,
                entities,
                batch_size,
                ..
            } => {
                assert_eq!(input, PathBuf::from("comments.csv"));
                assert!(resume);
                assert!(yes);
                assert!(entities.is_none());
                assert_eq!(batch_size, Some(50));
            }
            other => panic!("Expected Import, got {other:?}"),
        }
        assert_eq!(cli.format, OutputFormat::Pretty);
    }

    #[test]
    fn test_parse_format_template() {
        let cli = Cli::parse_from(["knesset-import", "format", "--template", "template.csv"]);
        match cli.command {
            Commands::Format { paths, template } => {
                assert!(template);
                assert_eq!(paths, vec![PathBuf::from("template.csv")]);
            }
            other => panic!("Expected Format, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::parse_from([
            "knesset-import",
            "validate",
            "in.json",
            "--config",
            "settings.yaml",
            "--format",
            "json",
            "-v",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("settings.yaml")));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.verbose);
    }

    #[test]
    fn test_format_requires_paths() {
        assert!(Cli::try_parse_from(["knesset-import", "format"]).is_err());
        assert!(Cli::try_parse_from(["knesset-import", "format", "a", "b", "c"]).is_err());
    }
}
