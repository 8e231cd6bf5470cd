use crate::error::{Result, SeedError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Upper bound on `_NNNN` disambiguators tried for one stem.
const MAX_DISAMBIGUATORS: u32 = 9999;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents partial writes from corrupting files. Overwrites `path`.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = staged(path, data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Write a file only if it does not already exist. Returns true if written.
pub fn write_if_missing(path: &Path, data: &[u8]) -> Result<bool> {
    let tmp = staged(path, data)?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error.into()),
    }
}

/// Write `data` to a file that did not exist before this call.
///
/// Tries `{dir}/{stem}.{ext}` first, then `{stem}_0001.{ext}`, `{stem}_0002.{ext}`, ...
/// Each attempt is an atomic no-clobber rename, so two writers racing for the
/// same name can never replace each other's file. The data is flushed to
/// storage before the rename. Returns the path that was created.
pub fn create_unique(dir: &Path, stem: &str, ext: &str, data: &[u8]) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let mut tmp = staged(&dir.join(format!("{stem}.{ext}")), data)?;

    for n in 0..=MAX_DISAMBIGUATORS {
        let name = if n == 0 {
            format!("{stem}.{ext}")
        } else {
            format!("{stem}_{n:04}.{ext}")
        };
        let candidate = dir.join(name);
        match tmp.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                tmp = e.file;
            }
            Err(e) => return Err(e.error.into()),
        }
    }

    Err(SeedError::Failed(format!(
        "no free file name for '{stem}.{ext}' in {}",
        dir.display()
    )))
}

/// Stage `data` in a synced tempfile next to `path`.
fn staged(path: &Path, data: &[u8]) -> Result<NamedTempFile> {
    let dir = path.parent().unwrap_or(Path::new("."));
    ensure_dir(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}
