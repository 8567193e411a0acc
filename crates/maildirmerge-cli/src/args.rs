//! Command line arguments

use clap::Parser;
use maildirmerge_common::MergeConfig;
use std::path::PathBuf;

/// Merge maildir folders into a destination folder
#[derive(Parser, Debug)]
#[command(name = "maildirmerge", version, about, long_about = None)]
pub struct Args {
    /// Proceed even if the destination folder type can't be determined
    #[arg(short, long)]
    pub force: bool,

    /// Show what would be done without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Transfer POP3 UIDLs of moved messages
    #[arg(long)]
    pub pop3_uidl: bool,

    /// Move seen messages into this destination subfolder when the
    /// destination is used for POP3
    #[arg(long, value_name = "NAME")]
    pub pop3_redirect: Option<String>,

    /// Merge seen messages even if the destination is used for POP3
    #[arg(long)]
    pub pop3_merge_seen: bool,

    /// Subscribe moved folders when the source type can't tell
    #[arg(long)]
    pub subscribe: bool,

    /// Configuration file
    #[arg(long, env = "MAILDIRMERGE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Folder to merge into
    pub destination: PathBuf,

    /// Folders to merge, in order
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,
}

impl Args {
    /// Layer the command line flags over the file configuration
    pub fn merge_config(&self, file: &MergeConfig) -> MergeConfig {
        MergeConfig {
            force: self.force || file.force,
            dry_run: self.dry_run || file.dry_run,
            pop3_uidl: self.pop3_uidl || file.pop3_uidl,
            pop3_merge_seen: self.pop3_merge_seen || file.pop3_merge_seen,
            pop3_redirect: self
                .pop3_redirect
                .clone()
                .or_else(|| file.pop3_redirect.clone()),
            subscribe: self.subscribe || file.subscribe,
        }
    }
}
