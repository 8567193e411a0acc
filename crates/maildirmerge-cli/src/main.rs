//! maildirmerge - merge maildir folders into a destination folder

mod args;

use anyhow::{bail, Context, Result};
use args::Args;
use clap::{error::ErrorKind, CommandFactory, Parser};
use maildirmerge_common::{Config, Error, LoggingConfig, MergeConfig};
use maildirmerge_core::{builtin_registry, MergeSummary, Merger};
use maildirmerge_storage::MaildirFolder;
use std::io;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref());
    init_logging(
        config
            .as_ref()
            .map(|c| &c.logging)
            .unwrap_or(&LoggingConfig::default()),
    );
    let config = match config {
        Ok(config) => config,
        Err(e) => return setup_failure(e),
    };

    let merge_config = args.merge_config(&config.merge);
    if let Err(e) = merge_config.validate() {
        return setup_failure(e);
    }

    match run(&args, &merge_config) {
        Ok(summary) => {
            info!("Done: {}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Report an error raised before merging. Configuration problems end with
/// the usage text, like a bad command line.
fn setup_failure(e: Error) -> ExitCode {
    if e.is_usage() {
        Args::command()
            .error(ErrorKind::ValueValidation, e.to_string())
            .exit();
    }
    error!("{}", e);
    ExitCode::FAILURE
}

/// Merge every source into the destination.
///
/// Only destination setup failures are returned; problems inside a merge
/// are counted in the summary.
fn run(args: &Args, config: &MergeConfig) -> Result<MergeSummary> {
    let registry = builtin_registry();
    debug!(types = ?registry.labels(), "Registered server types");

    let dest = MaildirFolder::open(&args.destination).with_context(|| {
        format!(
            "Cannot open destination folder {}",
            args.destination.display()
        )
    })?;

    let mut dest_types = registry.detect(&dest);
    if dest_types.is_empty() {
        if !config.force {
            bail!(
                "{}: unable to determine folder type, use --force to merge anyway",
                dest.path().display()
            );
        }
        warn!(
            "{}: no type detected, proceeding as bare maildir",
            dest.path().display()
        );
    }
    for t in &dest_types {
        info!("{}: Detected type: {}", dest.path().display(), t.label());
    }

    if config.dry_run {
        info!("Dry run, nothing will be changed");
    }

    let merger = Merger::new(&registry, config);
    let mut total = MergeSummary::default();
    for source in &args.sources {
        let summary = merger.merge(&dest, &mut dest_types, source);
        info!(source = %source.display(), "{}", summary);
        total.absorb(&summary);
    }

    for t in dest_types {
        let label = t.label();
        if let Err(e) = t.close() {
            error!("{} ({}): {}", dest.path().display(), label, e);
            total.errors += 1;
        }
    }

    Ok(total)
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .init();
    }
}
