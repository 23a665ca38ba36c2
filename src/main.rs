// Allow common clippy pedantic lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! knesset-import CLI
//!
//! Command-line interface for validating, formatting and importing comments

use clap::Parser;
use knesset_import::cli::{Cli, Runner, EXIT_FAILURE};
use knesset_import::engine::ShutdownFlag;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Ctrl-C asks the import loop to stop between rows; a second one exits
    let shutdown = ShutdownFlag::new();
    let signal_flag = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current row");
            signal_flag.request();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(knesset_import::cli::EXIT_INTERRUPTED);
        }
    });

    let runner = Runner::new(cli).with_shutdown(shutdown);

    match runner.run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(EXIT_FAILURE);
        }
    }
}
