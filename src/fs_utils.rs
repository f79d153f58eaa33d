//! Filesystem utility functions
//!
//! Small helpers shared by the config store and the environment propagator.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Replace the contents of `path` in one step
///
/// Writes to a sibling temp file and renames it over the target, so readers
/// never observe a half-written file. A symlinked `path` is followed and the
/// file it points to is replaced; an existing file keeps its permissions.
/// The parent directory is created if missing.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let target = match fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == io::ErrorKind::NotFound => path.to_path_buf(),
        Err(e) => return Err(e),
    };
    let permissions = fs::metadata(&target).ok().map(|m| m.permissions());

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = target.with_file_name(temp_name);

    fs::write(&temp_path, contents)?;
    if let Some(permissions) = permissions {
        fs::set_permissions(&temp_path, permissions)?;
    }
    fs::rename(&temp_path, &target)
}

/// Append `text` to a file that must already exist
///
/// The file is never created. The handle is closed before returning.
pub fn append_to_existing(path: &Path, text: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()
}
