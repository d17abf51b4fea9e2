//! Durable write-rename: the final file on disk is always either the
//! old content or the complete new content, never a partial write.

use codex_types::Error;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Writes `bytes` to `path` durably: a uniquely-named temp file is
/// created in `path`'s parent directory, written, flushed, given
/// `mode`, then renamed over `path`. The parent directory is synced
/// afterward so the rename itself is durable. On any failure before
/// the rename the temp file is removed and `path` is left untouched.
///
/// # Errors
///
/// Returns an `Io` error if any step of the write-rename-sync
/// sequence fails.
pub fn write(path: &Path, bytes: &[u8], mode: u32) -> Result<(), Error> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    tmp.as_file()
        .set_permissions(fs::Permissions::from_mode(mode))?;

    tmp.persist(path).map_err(|e| e.error)?;

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;

    sync_dir(dir)?;
    Ok(())
}

fn sync_dir(dir: &Path) -> Result<(), Error> {
    #[cfg(unix)]
    {
        let f = File::open(dir)?;
        f.sync_all()?;
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn writes_and_renames_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write(&path, b"hello", 0o600).unwrap();

        let mut buf = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello");
    }

    #[test]
    fn overwrites_existing_file_completely() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write(&path, b"first content here", 0o600).unwrap();
        write(&path, b"second", 0o600).unwrap();

        let mut buf = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"second");
    }

    #[cfg(unix)]
    #[test]
    fn sets_requested_mode() {
        use std::os::unix::fs::MetadataExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write(&path, b"x", 0o600).unwrap();
        let mode = fs::metadata(&path).unwrap().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn no_leftover_temp_files_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write(&path, b"x", 0o600).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
