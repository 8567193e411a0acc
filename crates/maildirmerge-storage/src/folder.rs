//! Maildir folder handles
//!
//! A folder is a directory holding `new/`, `cur/` and `tmp/`, plus
//! dot-prefixed subfolders in the Maildir++ layout.

use maildirmerge_common::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Subdirectory holding newly delivered messages
pub const NEW_DIR: &str = "new";
/// Subdirectory holding messages a client has already looked at
pub const CUR_DIR: &str = "cur";
/// Subdirectory used during delivery
pub const TMP_DIR: &str = "tmp";
/// Marker file identifying a Maildir++ subfolder
pub const FOLDER_MARKER: &str = "maildirfolder";

/// Kind of a directory entry. Symlinks are `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Directory,
    Other,
}

impl From<fs::FileType> for EntryKind {
    fn from(ft: fs::FileType) -> Self {
        if ft.is_file() {
            EntryKind::Regular
        } else if ft.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::Other
        }
    }
}

/// One entry of a folder listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub name: OsString,
    pub kind: EntryKind,
}

impl FolderEntry {
    /// Whether this entry names a Maildir++ subfolder
    pub fn is_subfolder(&self) -> bool {
        self.kind == EntryKind::Directory && is_subfolder_name(&self.name)
    }
}

/// Dot-prefixed names other than `.` and `..` are subfolders
pub fn is_subfolder_name(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') && name != "." && name != ".."
}

/// Handle on an existing maildir folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaildirFolder {
    path: PathBuf,
}

impl MaildirFolder {
    /// Open a folder, checking that it is a directory
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            _ => Error::Storage(format!("{}: {}", path.display(), e)),
        })?;

        if !metadata.is_dir() {
            return Err(Error::Storage(format!(
                "{}: not a directory",
                path.display()
            )));
        }

        Ok(Self { path })
    }

    /// Open a child folder by name
    pub fn open_child(&self, name: &OsStr) -> Result<Self> {
        Self::open(self.path.join(name))
    }

    /// Folder path, for diagnostics
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `subdir/name` inside this folder (`name` directly when `subdir` is empty)
    pub fn entry_path(&self, subdir: &str, name: &OsStr) -> PathBuf {
        if subdir.is_empty() {
            self.path.join(name)
        } else {
            self.path.join(subdir).join(name)
        }
    }

    /// Whether an entry with this name exists directly under the folder.
    ///
    /// Errors other than "not found" are returned to the caller.
    pub fn has_entry(&self, name: &OsStr) -> io::Result<bool> {
        match fs::symlink_metadata(self.path.join(name)) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fail unless `subdir` exists as a directory inside the folder
    pub fn require_subdir(&self, subdir: &str) -> Result<()> {
        let path = self.path.join(subdir);
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(Error::Storage(format!("{}: not a directory", path.display()))),
            Err(e) => Err(Error::Storage(format!("{}: {}", path.display(), e))),
        }
    }

    /// List the entries of `subdir` (the folder root when empty).
    ///
    /// The directory is read to completion and closed before returning, so
    /// callers may move entries while walking the result. Entries whose type
    /// can't be resolved are reported and left out.
    pub fn list(&self, subdir: &str) -> Result<Vec<FolderEntry>> {
        let dir = if subdir.is_empty() {
            self.path.clone()
        } else {
            self.path.join(subdir)
        };

        let reader = fs::read_dir(&dir)
            .map_err(|e| Error::Storage(format!("{}: {}", dir.display(), e)))?;

        let mut entries = Vec::new();
        for entry in reader {
            let entry =
                entry.map_err(|e| Error::Storage(format!("{}: {}", dir.display(), e)))?;
            let name = entry.file_name();

            match resolve_kind(&entry) {
                Ok(kind) => entries.push(FolderEntry { name, kind }),
                Err(e) => {
                    error!(path = %entry.path().display(), error = %e, "Failed to stat entry");
                }
            }
        }

        debug!(dir = %dir.display(), count = entries.len(), "Listed folder entries");

        Ok(entries)
    }

    /// Subfolders directly under the folder root, sorted by name.
    ///
    /// Symlinks are not subfolders, whatever they point at.
    pub fn subfolders(&self) -> Result<Vec<OsString>> {
        let mut names: Vec<OsString> = self
            .list("")?
            .into_iter()
            .filter(FolderEntry::is_subfolder)
            .map(|entry| entry.name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Open the named subfolder, creating it when it doesn't exist.
    ///
    /// A new subfolder gets `new/`, `cur/`, `tmp/` and the `maildirfolder`
    /// marker. In dry-run mode nothing is created and the returned handle
    /// refers to the folder that would have been made.
    pub fn create_subfolder(&self, name: &str, dry_run: bool) -> Result<MaildirFolder> {
        let path = self.path.join(name);

        match fs::symlink_metadata(&path) {
            Ok(_) => return Self::open(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Storage(format!("{}: {}", path.display(), e))),
        }

        if dry_run {
            info!(path = %path.display(), "Would create folder");
            return Ok(Self { path });
        }

        let mut builder = fs::DirBuilder::new();
        builder.mode(0o700);

        builder
            .create(&path)
            .map_err(|e| Error::Storage(format!("{}: {}", path.display(), e)))?;
        for subdir in [NEW_DIR, CUR_DIR, TMP_DIR] {
            let subpath = path.join(subdir);
            builder
                .create(&subpath)
                .map_err(|e| Error::Storage(format!("{}: {}", subpath.display(), e)))?;
        }
        let marker = path.join(FOLDER_MARKER);
        fs::write(&marker, b"")
            .map_err(|e| Error::Storage(format!("{}: {}", marker.display(), e)))?;

        info!(path = %path.display(), "Created folder");

        Ok(Self { path })
    }
}

/// Resolve an entry's type from the directory entry, falling back to
/// `lstat` when the entry doesn't carry it. Symlinks are never followed and
/// come out as [`EntryKind::Other`].
fn resolve_kind(entry: &fs::DirEntry) -> io::Result<EntryKind> {
    match entry.file_type() {
        Ok(ft) => Ok(ft.into()),
        Err(_) => fs::symlink_metadata(entry.path()).map(|m| m.file_type().into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn make_maildir(path: &Path) {
        for subdir in [NEW_DIR, CUR_DIR, TMP_DIR] {
            fs::create_dir_all(path.join(subdir)).unwrap();
        }
    }

    #[test]
    fn test_open_requires_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file");
        fs::write(&file, b"x").unwrap();

        assert!(MaildirFolder::open(temp_dir.path()).is_ok());
        assert!(matches!(
            MaildirFolder::open(&file),
            Err(Error::Storage(_))
        ));
        assert!(matches!(
            MaildirFolder::open(temp_dir.path().join("missing")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_require_subdir() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join(NEW_DIR)).unwrap();
        fs::write(temp_dir.path().join(CUR_DIR), b"").unwrap();

        let folder = MaildirFolder::open(temp_dir.path()).unwrap();
        assert!(folder.require_subdir(NEW_DIR).is_ok());
        assert!(folder.require_subdir(CUR_DIR).is_err());
        assert!(folder.require_subdir(TMP_DIR).is_err());
    }

    #[test]
    fn test_list_classifies_entries() {
        let temp_dir = TempDir::new().unwrap();
        make_maildir(temp_dir.path());
        fs::write(temp_dir.path().join("new/msg1"), b"a").unwrap();
        fs::create_dir(temp_dir.path().join("new/dir")).unwrap();
        std::os::unix::fs::symlink("msg1", temp_dir.path().join("new/link")).unwrap();

        let folder = MaildirFolder::open(temp_dir.path()).unwrap();
        let mut entries = folder.list(NEW_DIR).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(
            entries,
            vec![
                FolderEntry {
                    name: "dir".into(),
                    kind: EntryKind::Directory
                },
                FolderEntry {
                    name: "link".into(),
                    kind: EntryKind::Other
                },
                FolderEntry {
                    name: "msg1".into(),
                    kind: EntryKind::Regular
                },
            ]
        );
    }

    #[test]
    fn test_dangling_symlink_is_not_followed() {
        let temp_dir = TempDir::new().unwrap();
        make_maildir(temp_dir.path());
        std::os::unix::fs::symlink("nowhere", temp_dir.path().join("cur/broken")).unwrap();

        let folder = MaildirFolder::open(temp_dir.path()).unwrap();
        assert_eq!(
            folder.list(CUR_DIR).unwrap(),
            vec![FolderEntry {
                name: "broken".into(),
                kind: EntryKind::Other
            }]
        );
    }

    #[test]
    fn test_subfolders() {
        let temp_dir = TempDir::new().unwrap();
        make_maildir(temp_dir.path());
        fs::create_dir(temp_dir.path().join(".Archive")).unwrap();
        fs::create_dir(temp_dir.path().join(".Archive.2024")).unwrap();
        fs::write(temp_dir.path().join(".hidden-file"), b"").unwrap();
        fs::create_dir(temp_dir.path().join("elsewhere")).unwrap();
        std::os::unix::fs::symlink("elsewhere", temp_dir.path().join(".Linked")).unwrap();

        let folder = MaildirFolder::open(temp_dir.path()).unwrap();
        let subfolders = folder.subfolders().unwrap();

        assert_eq!(
            subfolders,
            vec![OsString::from(".Archive"), OsString::from(".Archive.2024")]
        );
    }

    #[test]
    fn test_subfolder_names() {
        assert!(is_subfolder_name(OsStr::new(".Sent")));
        assert!(!is_subfolder_name(OsStr::new(".")));
        assert!(!is_subfolder_name(OsStr::new("..")));
        assert!(!is_subfolder_name(OsStr::new("cur")));
    }

    #[test]
    fn test_create_subfolder() {
        let temp_dir = TempDir::new().unwrap();
        make_maildir(temp_dir.path());
        let folder = MaildirFolder::open(temp_dir.path()).unwrap();

        let sub = folder.create_subfolder(".Seen", false).unwrap();
        assert_eq!(sub.path(), temp_dir.path().join(".Seen"));
        for subdir in [NEW_DIR, CUR_DIR, TMP_DIR] {
            assert!(sub.path().join(subdir).is_dir());
        }
        assert!(sub.path().join(FOLDER_MARKER).is_file());

        // existing folder is reused
        fs::write(sub.path().join("cur/keep"), b"x").unwrap();
        let again = folder.create_subfolder(".Seen", false).unwrap();
        assert!(again.path().join("cur/keep").exists());
    }

    #[test]
    fn test_create_subfolder_dry_run() {
        let temp_dir = TempDir::new().unwrap();
        make_maildir(temp_dir.path());
        let folder = MaildirFolder::open(temp_dir.path()).unwrap();

        let sub = folder.create_subfolder(".Seen", true).unwrap();
        assert_eq!(sub.path(), temp_dir.path().join(".Seen"));
        assert!(!sub.path().exists());
    }
}
