//! Numbered backup rotation for the snapshot engine. Orchestrated by
//! the store façade (not the engine) and always run under a dedicated
//! mutex distinct from the data and I/O locks, so that concurrent
//! persists can never interleave a rename with a copy.

use codex_types::Error;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

fn bak_path(path: &Path, n: u32) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(format!(".bak.{n}"));
    PathBuf::from(s)
}

/// Rotates `<path>.bak.1..N` one slot older, then copies the current
/// `path` into `.bak.1`. A no-op if `num_backups == 0` or `path`
/// doesn't exist yet (nothing to back up on the very first persist).
///
/// # Errors
///
/// Returns an `Io` error if any rename, copy, or permission-set step
/// fails.
pub fn rotate(path: &Path, num_backups: u32) -> Result<(), Error> {
    if num_backups == 0 || !path.exists() {
        return Ok(());
    }

    for i in (1..num_backups).rev() {
        let src = bak_path(path, i);
        let dst = bak_path(path, i + 1);
        if src.exists() {
            fs::rename(&src, &dst)?;
        }
    }

    let first = bak_path(path, 1);
    fs::copy(path, &first)?;
    #[cfg(unix)]
    fs::set_permissions(&first, fs::Permissions::from_mode(0o600))?;

    let overflow = bak_path(path, num_backups + 1);
    if overflow.exists() {
        fs::remove_file(&overflow)?;
    }
    Ok(())
}
