//! Helpers for the small text files servers keep next to their folders

use super::types::{TypeError, TypeResult};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Read a side file, treating a missing file as empty
pub fn read_optional(path: &Path) -> TypeResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(TypeError::io(path, e)),
    }
}

/// Replace a side file by writing a sibling temporary file and renaming it
pub fn replace(path: &Path, content: &str) -> TypeResult<()> {
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(format!(".{}.tmp", std::process::id()));
    let tmp_path = path.with_file_name(tmp_name);

    write_new(&tmp_path, content)?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        TypeError::io(path, e)
    })
}

/// Create `path`, failing if it already exists, and fill it with `content`
pub fn write_new(path: &Path, content: &str) -> TypeResult<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| TypeError::io(path, e))?;
    file.write_all(content.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| TypeError::io(path, e))
}
