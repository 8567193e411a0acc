//! Message relocation between folders
//!
//! Moves are a single `rename` when source and destination share a device.
//! Across devices the entry is copied and the source removed afterwards, so
//! a failure part way never leaves the message missing from both sides.

use crate::folder::MaildirFolder;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

/// Failure to relocate one entry
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("{}: source vanished", src.display())]
    SourceMissing { src: PathBuf },

    #[error("{} -> {}: destination already exists", src.display(), dest.display())]
    Collision { src: PathBuf, dest: PathBuf },

    #[error("{} -> {}: {}", src.display(), dest.display(), source)]
    Io {
        src: PathBuf,
        dest: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How an entry reached its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Renamed in place
    Renamed,
    /// Copied across devices, source removed
    Copied,
    /// Dry run, nothing touched
    Planned,
}

/// Relocates messages and whole subfolders, honouring dry-run
#[derive(Debug, Clone, Copy)]
pub struct FileMover {
    dry_run: bool,
}

impl FileMover {
    /// Create a new mover
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Whether this mover only reports
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Move `src/subdir/name` to `dest/subdir/name`, reporting any failure.
    ///
    /// Returns whether the entry was (or, in dry-run, would be) moved.
    pub fn relocate(
        &self,
        src: &MaildirFolder,
        dest: &MaildirFolder,
        subdir: &str,
        name: &OsStr,
    ) -> bool {
        match self.try_relocate(src, dest, subdir, name) {
            Ok(_) => true,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    /// Move `src/subdir/name` to `dest/subdir/name`.
    ///
    /// An empty `subdir` moves the entry directly between the folder roots.
    /// An existing destination is never overwritten.
    pub fn try_relocate(
        &self,
        src: &MaildirFolder,
        dest: &MaildirFolder,
        subdir: &str,
        name: &OsStr,
    ) -> Result<MoveOutcome, MoveError> {
        let src_path = src.entry_path(subdir, name);
        let dest_path = dest.entry_path(subdir, name);

        match fs::symlink_metadata(&src_path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(MoveError::SourceMissing { src: src_path });
            }
            Err(e) => {
                return Err(MoveError::Io {
                    src: src_path,
                    dest: dest_path,
                    source: e,
                });
            }
        }

        if fs::symlink_metadata(&dest_path).is_ok() {
            return Err(MoveError::Collision {
                src: src_path,
                dest: dest_path,
            });
        }

        if self.dry_run {
            info!(
                "Would move {} -> {}",
                src_path.display(),
                dest_path.display()
            );
            return Ok(MoveOutcome::Planned);
        }

        match fs::rename(&src_path, &dest_path) {
            Ok(()) => {
                debug!(src = %src_path.display(), dest = %dest_path.display(), "Moved");
                Ok(MoveOutcome::Renamed)
            }
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                copy_then_remove(&src_path, &dest_path).map_err(|source| MoveError::Io {
                    src: src_path.clone(),
                    dest: dest_path.clone(),
                    source,
                })?;
                debug!(src = %src_path.display(), dest = %dest_path.display(), "Copied across devices");
                Ok(MoveOutcome::Copied)
            }
            Err(e) => Err(MoveError::Io {
                src: src_path,
                dest: dest_path,
                source: e,
            }),
        }
    }
}

/// Copy `src` to `dest` and remove `src` once the copy is complete.
///
/// A partial copy is removed again, leaving the source untouched. An entry
/// that already sits at `dest` was not made here and is left alone.
fn copy_then_remove(src: &Path, dest: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(src)?;

    let mut created = false;
    if let Err(e) = copy_tree(src, dest, &metadata, &mut created) {
        if created {
            let _ = if metadata.is_dir() {
                fs::remove_dir_all(dest)
            } else {
                fs::remove_file(dest)
            };
        }
        return Err(e);
    }

    if metadata.is_dir() {
        fs::remove_dir_all(src)
    } else {
        fs::remove_file(src)
    }
}

/// Copy one entry, recursing into directories. `created` is set once
/// `dest` itself has been made.
fn copy_tree(
    src: &Path,
    dest: &Path,
    metadata: &fs::Metadata,
    created: &mut bool,
) -> io::Result<()> {
    if metadata.file_type().is_symlink() {
        std::os::unix::fs::symlink(fs::read_link(src)?, dest)?;
        *created = true;
        return Ok(());
    }

    if !metadata.is_dir() {
        let mut reader = fs::File::open(src)?;
        let mut writer = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)?;
        *created = true;
        io::copy(&mut reader, &mut writer)?;
        writer.sync_all()?;
        return fs::set_permissions(dest, metadata.permissions());
    }

    fs::create_dir(dest)?;
    *created = true;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let child_metadata = fs::symlink_metadata(entry.path())?;
        let mut child_created = false;
        copy_tree(
            &entry.path(),
            &dest.join(entry.file_name()),
            &child_metadata,
            &mut child_created,
        )?;
    }
    fs::set_permissions(dest, metadata.permissions())
}
