//! maildirmerge Storage - Maildir folder access
//!
//! This crate provides folder handles, message name parsing and
//! the mover that relocates messages between folders.

pub mod folder;
pub mod message;
pub mod mover;

pub use folder::{
    is_subfolder_name, EntryKind, FolderEntry, MaildirFolder, CUR_DIR, FOLDER_MARKER, NEW_DIR,
    TMP_DIR,
};
pub use message::{base_name, is_seen, MessageName};
pub use mover::{FileMover, MoveError, MoveOutcome};
