//! Recursive folder merge

use super::summary::MergeSummary;
use crate::servertypes::{describe, TypeCapability, TypeInstance, TypeRegistry};
use maildirmerge_common::{Error, MergeConfig, Result, SeenPolicy};
use maildirmerge_storage::{
    base_name, is_seen, EntryKind, FileMover, MaildirFolder, CUR_DIR, NEW_DIR,
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Redirect folder for seen mail, created on first use per source folder
enum RedirectTarget {
    Unresolved,
    Ready(MaildirFolder),
    Unavailable,
}

/// Merges source folder trees into a destination folder tree
pub struct Merger<'r> {
    registry: &'r TypeRegistry,
    config: MergeConfig,
    policy: SeenPolicy,
    mover: FileMover,
}

impl<'r> Merger<'r> {
    /// Create a merger for one run
    pub fn new(registry: &'r TypeRegistry, config: &MergeConfig) -> Self {
        Self {
            registry,
            policy: config.seen_policy(),
            mover: FileMover::new(config.dry_run),
            config: config.clone(),
        }
    }

    /// Merge the folder at `source` into `dest`.
    ///
    /// `dest_types` are the server types already detected for `dest` by the
    /// caller. Every problem is reported as it happens; the returned summary
    /// counts them but nothing is propagated, so the caller can go on with
    /// the next source.
    pub fn merge(
        &self,
        dest: &MaildirFolder,
        dest_types: &mut [TypeInstance<'_>],
        source: &Path,
    ) -> MergeSummary {
        let mut summary = MergeSummary::default();
        self.merge_into(dest, dest_types, source, &mut summary);
        summary
    }

    fn merge_into(
        &self,
        dest: &MaildirFolder,
        dest_types: &mut [TypeInstance<'_>],
        source: &Path,
        summary: &mut MergeSummary,
    ) {
        if let Err(e) = self.merge_folder(dest, dest_types, source, summary) {
            error!("{}", e);
            summary.errors += 1;
        }
    }

    /// One recursion level. Returning early releases the source handle and
    /// closes the source type context on the way out.
    fn merge_folder(
        &self,
        dest: &MaildirFolder,
        dest_types: &mut [TypeInstance<'_>],
        source: &Path,
        summary: &mut MergeSummary,
    ) -> Result<()> {
        let source = MaildirFolder::open(source)?;

        let mut source_types = self.registry.detect(&source);
        if source_types.len() > 1 {
            return Err(Error::AmbiguousType {
                path: source.path().display().to_string(),
                labels: describe(&source_types),
            });
        }
        let mut source_type = source_types.pop();

        info!(
            "Merging {} ({}) into {}",
            source.path().display(),
            source_type
                .as_ref()
                .map_or("no type detected", TypeInstance::label),
            dest.path().display()
        );

        let is_pop3 = dest_types.iter_mut().any(|t| t.is_pop3());
        if is_pop3 {
            info!("Destination folder {} is used for POP3", dest.path().display());
        }

        self.merge_new(&source, dest, summary)?;
        self.merge_cur(&source, &mut source_type, dest, dest_types, is_pop3, summary)?;
        self.merge_subfolders(&source, &mut source_type, dest, dest_types, summary)?;

        if let Some(source_type) = source_type {
            if let Err(e) = source_type.close() {
                error!("{}: {}", source.path().display(), e);
                summary.errors += 1;
            }
        }

        Ok(())
    }

    /// New mail has no seen state, so all of it moves
    fn merge_new(
        &self,
        source: &MaildirFolder,
        dest: &MaildirFolder,
        summary: &mut MergeSummary,
    ) -> Result<()> {
        dest.require_subdir(NEW_DIR)?;

        for entry in source.list(NEW_DIR)? {
            if entry.kind != EntryKind::Regular {
                warn!(
                    "{}: not a regular file, skipped",
                    source.entry_path(NEW_DIR, &entry.name).display()
                );
                continue;
            }

            if self.mover.relocate(source, dest, NEW_DIR, &entry.name) {
                summary.moved_new += 1;
            } else {
                summary.errors += 1;
            }
        }

        Ok(())
    }

    fn merge_cur(
        &self,
        source: &MaildirFolder,
        source_type: &mut Option<TypeInstance<'_>>,
        dest: &MaildirFolder,
        dest_types: &mut [TypeInstance<'_>],
        is_pop3: bool,
        summary: &mut MergeSummary,
    ) -> Result<()> {
        dest.require_subdir(CUR_DIR)?;

        let mut redirect = RedirectTarget::Unresolved;

        for entry in source.list(CUR_DIR)? {
            let path = source.entry_path(CUR_DIR, &entry.name);
            if entry.kind != EntryKind::Regular {
                warn!("{}: not a regular file, skipped", path.display());
                continue;
            }

            let name = entry.name.to_string_lossy();
            let withheld = is_pop3 && self.policy != SeenPolicy::Merge && is_seen(&name);

            if !withheld {
                if self.mover.relocate(source, dest, CUR_DIR, &entry.name) {
                    summary.moved_cur += 1;
                    if self.config.pop3_uidl {
                        self.transfer_uidl(base_name(&name), source_type, dest_types, summary);
                    }
                } else {
                    summary.errors += 1;
                }
                continue;
            }

            let target = match &self.policy {
                SeenPolicy::Redirect(folder_name) => {
                    self.redirect_target(&mut redirect, dest, folder_name, summary)
                }
                _ => None,
            };

            match target {
                Some(target) => {
                    if self.mover.relocate(source, target, CUR_DIR, &entry.name) {
                        summary.redirected += 1;
                    } else {
                        summary.errors += 1;
                    }
                }
                None => {
                    if self.mover.is_dry_run() {
                        info!(
                            "{}: left behind (seen, destination is POP3, no redirect)",
                            path.display()
                        );
                    } else {
                        debug!(path = %path.display(), "Left behind");
                    }
                    summary.left_behind += 1;
                }
            }
        }

        Ok(())
    }

    fn redirect_target<'a>(
        &self,
        redirect: &'a mut RedirectTarget,
        dest: &MaildirFolder,
        folder_name: &str,
        summary: &mut MergeSummary,
    ) -> Option<&'a MaildirFolder> {
        if let RedirectTarget::Unresolved = redirect {
            let resolved = dest
                .create_subfolder(folder_name, self.mover.is_dry_run())
                .and_then(|folder| {
                    if !self.mover.is_dry_run() {
                        folder.require_subdir(CUR_DIR)?;
                    }
                    Ok(folder)
                });

            *redirect = match resolved {
                Ok(folder) => {
                    info!("Redirecting seen messages to {}", folder.path().display());
                    RedirectTarget::Ready(folder)
                }
                Err(e) => {
                    error!("Redirect folder unavailable, seen messages stay behind: {}", e);
                    summary.errors += 1;
                    RedirectTarget::Unavailable
                }
            };
        }

        match redirect {
            RedirectTarget::Ready(folder) => Some(folder),
            _ => None,
        }
    }

    /// Copy the UIDL of a moved message. The move itself is not undone when
    /// this fails.
    fn transfer_uidl(
        &self,
        base: &str,
        source_type: &mut Option<TypeInstance<'_>>,
        dest_types: &mut [TypeInstance<'_>],
        summary: &mut MergeSummary,
    ) {
        let Some(source_type) = source_type
            .as_mut()
            .filter(|t| t.supports(TypeCapability::GetUidl))
        else {
            error!("UIDL transfer requested but source doesn't support UIDL retrieval");
            summary.errors += 1;
            return;
        };

        let uidl = match source_type.pop3_uidl(base) {
            Ok(Some(uidl)) => uidl,
            Ok(None) => {
                debug!(base, "No UIDL recorded");
                return;
            }
            Err(e) => {
                error!("{}: failed to fetch UIDL: {}", base, e);
                summary.errors += 1;
                return;
            }
        };

        if self.mover.is_dry_run() {
            info!("Would set UIDL of {} to {}", base, uidl);
            return;
        }

        for dest_type in dest_types
            .iter_mut()
            .filter(|t| t.supports(TypeCapability::SetUidl))
        {
            match dest_type.set_pop3_uidl(base, &uidl) {
                Ok(()) => summary.uidls_transferred += 1,
                Err(e) => {
                    error!("{}: failed to set UIDL via {}: {}", base, dest_type.label(), e);
                    summary.errors += 1;
                }
            }
        }
    }

    fn merge_subfolders(
        &self,
        source: &MaildirFolder,
        source_type: &mut Option<TypeInstance<'_>>,
        dest: &MaildirFolder,
        dest_types: &mut [TypeInstance<'_>],
        summary: &mut MergeSummary,
    ) -> Result<()> {
        for name in source.subfolders()? {
            info!("Sub folder: {}", name.to_string_lossy());

            match dest.has_entry(&name) {
                Ok(true) => self.merge_existing_subfolder(source, dest, &name, summary),
                Ok(false) => {
                    self.move_subfolder(source, source_type, dest, dest_types, &name, summary)
                }
                Err(e) => {
                    error!("{}: {}", dest.entry_path("", &name).display(), e);
                    summary.errors += 1;
                }
            }
        }

        Ok(())
    }

    /// Both sides have the subfolder: detect the destination's types afresh
    /// and recurse.
    fn merge_existing_subfolder(
        &self,
        source: &MaildirFolder,
        dest: &MaildirFolder,
        name: &OsStr,
        summary: &mut MergeSummary,
    ) {
        let sub_dest = match dest.open_child(name) {
            Ok(folder) => folder,
            Err(e) => {
                error!("{}", e);
                summary.errors += 1;
                return;
            }
        };

        let mut sub_types = self.registry.detect(&sub_dest);
        for t in &sub_types {
            info!("{}: Detected type: {}", sub_dest.path().display(), t.label());
        }

        let sub_source = source.entry_path("", name);
        let errors_before = summary.errors;
        self.merge_into(&sub_dest, &mut sub_types, &sub_source, summary);
        if summary.errors == errors_before {
            summary.subfolders_merged += 1;
        }

        for t in sub_types {
            let label = t.label();
            if let Err(e) = t.close() {
                error!("{} ({}): {}", sub_dest.path().display(), label, e);
                summary.errors += 1;
            }
        }
    }

    /// Only the source has the subfolder: move it over whole, then carry
    /// its subscription state.
    fn move_subfolder(
        &self,
        source: &MaildirFolder,
        source_type: &mut Option<TypeInstance<'_>>,
        dest: &MaildirFolder,
        dest_types: &mut [TypeInstance<'_>],
        name: &OsStr,
        summary: &mut MergeSummary,
    ) {
        if !self.mover.relocate(source, dest, "", name) {
            summary.errors += 1;
            return;
        }
        summary.subfolders_moved += 1;

        let name = name.to_string_lossy();
        let subscribe = match source_type
            .as_mut()
            .filter(|t| t.supports(TypeCapability::QuerySubscription))
        {
            Some(source_type) => match source_type.is_subscribed(&name) {
                Ok(subscribed) => subscribed,
                Err(e) => {
                    error!("{}: failed to query subscription: {}", name, e);
                    summary.errors += 1;
                    false
                }
            },
            None => self.config.subscribe,
        };

        if !subscribe {
            return;
        }

        if self.mover.is_dry_run() {
            info!("Will subscribe to {} on destination", name);
            return;
        }

        for dest_type in dest_types
            .iter_mut()
            .filter(|t| t.supports(TypeCapability::Subscribe))
        {
            match dest_type.subscribe(&name) {
                Ok(()) => summary.subscribed += 1,
                Err(e) => {
                    error!("{}: failed to subscribe via {}: {}", name, dest_type.label(), e);
                    summary.errors += 1;
                }
            }
        }
    }
}
