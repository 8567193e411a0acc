//! Where a folder sits within its Maildir++ account
//!
//! Servers keep account-wide state, such as IMAP subscriptions, at the
//! account root. Subfolders are the dot-named directories directly under it.

use maildirmerge_storage::{is_subfolder_name, CUR_DIR, FOLDER_MARKER};
use std::path::{Path, PathBuf};

/// Account root of a folder, and the folder's own name within the account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPath {
    root: PathBuf,
    /// `.Name` of the folder, `None` for the account root itself
    folder: Option<String>,
}

impl AccountPath {
    /// Locate a folder. A dot-named folder carrying the `maildirfolder`
    /// marker, or sitting directly in another maildir, is a subfolder of
    /// that maildir's account. Anything else is an account root.
    pub fn locate(path: &Path) -> Self {
        let subfolder = path
            .file_name()
            .filter(|name| is_subfolder_name(name))
            .and_then(|name| {
                let parent = path.parent()?;
                let nested = path.join(FOLDER_MARKER).is_file() || parent.join(CUR_DIR).is_dir();
                nested.then(|| (parent.to_path_buf(), name.to_string_lossy().into_owned()))
            });

        match subfolder {
            Some((root, name)) => Self {
                root,
                folder: Some(name),
            },
            None => Self {
                root: path.to_path_buf(),
                folder: None,
            },
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Account-wide `.A.B` name of `subfolder`, a child of this folder
    pub fn qualify(&self, subfolder: &str) -> String {
        match &self.folder {
            Some(folder) => format!("{}.{}", folder, subfolder.trim_start_matches('.')),
            None => subfolder.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_account_root() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join(CUR_DIR)).unwrap();

        let account = AccountPath::locate(temp_dir.path());
        assert_eq!(account.root(), temp_dir.path());
        assert_eq!(account.qualify(".Sent"), ".Sent");
    }

    #[test]
    fn test_subfolder_resolves_to_root() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join(CUR_DIR)).unwrap();
        let archive = temp_dir.path().join(".Archive");
        fs::create_dir(&archive).unwrap();

        let account = AccountPath::locate(&archive);
        assert_eq!(account.root(), temp_dir.path());
        assert_eq!(account.qualify(".2024"), ".Archive.2024");
    }

    #[test]
    fn test_marker_identifies_subfolder() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join(".Archive");
        fs::create_dir(&archive).unwrap();
        fs::write(archive.join(FOLDER_MARKER), b"").unwrap();

        assert_eq!(AccountPath::locate(&archive).root(), temp_dir.path());
    }

    #[test]
    fn test_dot_named_root() {
        // a dot-named directory outside any maildir is its own account
        let temp_dir = TempDir::new().unwrap();
        let hidden = temp_dir.path().join(".maildir");
        fs::create_dir(&hidden).unwrap();

        let account = AccountPath::locate(&hidden);
        assert_eq!(account.root(), hidden.as_path());
        assert_eq!(account.qualify(".Sent"), ".Sent");
    }
}
