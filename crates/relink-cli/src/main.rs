//! relink CLI — transactional rename for markdown vaults
//!
//! Commands: mv (rename a document and rewrite references), recover
//! (resolve transactions left behind by an unclean shutdown).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use relink_core::RenameError;
use relink_engine::{RenameEngine, RenameRequest};

#[derive(Parser)]
#[command(name = "relink")]
#[command(version)]
#[command(about = "Transactional rename engine for markdown vaults")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Rename a document and rewrite every reference to it
    Mv {
        /// Source path, relative to the vault root
        from: PathBuf,
        /// Destination path, relative to the vault root
        to: PathBuf,
        /// Vault root directory
        #[arg(long, default_value = ".")]
        vault: PathBuf,
        /// Leave cross-references untouched
        #[arg(long)]
        no_links: bool,
        /// Replace an occupied destination
        #[arg(long)]
        overwrite: bool,
        /// Emit the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve write-ahead log records left by an unclean shutdown
    Recover {
        /// Vault root directory
        #[arg(long, default_value = ".")]
        vault: PathBuf,
        /// Emit the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct MvOutput {
    destination: PathBuf,
    references_updated: usize,
    elapsed_ms: u128,
    overwrote: bool,
}

#[derive(Serialize)]
struct RecoverOutput {
    discarded: usize,
    resumed: usize,
    skipped: usize,
    failed: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Mv {
            from,
            to,
            vault,
            no_links,
            overwrite,
            json,
        } => {
            let engine = RenameEngine::open(&vault)
                .with_context(|| format!("cannot open vault at {}", vault.display()))?;
            engine.recover().context("boot recovery failed")?;

            let request = RenameRequest {
                from,
                to,
                update_links: !no_links,
                overwrite,
            };
            match engine.rename(&request) {
                Ok(outcome) => {
                    if json {
                        let out = MvOutput {
                            destination: outcome.destination,
                            references_updated: outcome.references_updated,
                            elapsed_ms: outcome.elapsed.as_millis(),
                            overwrote: outcome.overwrote,
                        };
                        println!("{}", serde_json::to_string_pretty(&out)?);
                    } else {
                        println!(
                            "Renamed {} -> {} ({} document{} updated, {}ms)",
                            request.from.display(),
                            outcome.destination.display(),
                            outcome.references_updated,
                            if outcome.references_updated == 1 { "" } else { "s" },
                            outcome.elapsed.as_millis()
                        );
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    report_rename_error(&err);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Recover { vault, json } => {
            let engine = RenameEngine::open(&vault)
                .with_context(|| format!("cannot open vault at {}", vault.display()))?;
            let summary = engine.recover().context("recovery failed")?;

            if json {
                let out = RecoverOutput {
                    discarded: summary.discarded,
                    resumed: summary.resumed,
                    skipped: summary.skipped,
                    failed: summary.failed,
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!(
                    "Recovery: {} discarded, {} resumed, {} skipped, {} failed",
                    summary.discarded, summary.resumed, summary.skipped, summary.failed
                );
            }
            Ok(if summary.failed == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn report_rename_error(err: &RenameError) {
    match err {
        RenameError::SourceNotFound { .. }
        | RenameError::DestinationConflict { .. }
        | RenameError::StalenessConflict { .. } => eprintln!("error: {err}"),
        RenameError::Io {
            recovery_needed, ..
        } => {
            eprintln!("error: {err}");
            if *recovery_needed {
                eprintln!("run `relink recover` to finish the interrupted rename");
            }
        }
        other => eprintln!("error: {other}"),
    }
}
