use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::crypto::{CryptoProvider, Purpose, run_entry};
use crate::entry::EntrySource;
use crate::error::{Error, Result};

/// Prepare `target` for extraction.
///
/// An existing target is an error unless `overwrite` is set, in which case
/// it is removed first.
pub(crate) fn prepare_target(target: &Path, overwrite: bool) -> Result<()> {
    if fs::symlink_metadata(target).is_ok() {
        if !overwrite {
            return Err(Error::AlreadyExists(target.display().to_string()));
        }
        if target.is_dir() {
            fs::remove_dir_all(target)?;
        } else {
            fs::remove_file(target)?;
        }
    }
    fs::create_dir_all(target)?;
    Ok(())
}

/// Write every entry of `entries` under `target`.
///
/// Entries are decrypted for reading and re-encrypted with
/// [`Purpose::Write`], so the provider decides how the expanded copy is
/// protected.
pub(crate) fn extract_entries(
    entries: &EntrySource,
    provider: Option<&dyn CryptoProvider>,
    target: &Path,
) -> Result<usize> {
    let mut written = 0;
    for entry in entries {
        let dest = enclosed_path(target, entry.path())?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let plain = entry.read(None)?;
        let stored = match provider {
            None => plain,
            Some(p) => run_entry(p, plain, entry.path(), Purpose::Write)?,
        };

        fs::write(&dest, stored)?;
        tracing::trace!(path = entry.path(), dest = %dest.display(), "extracted entry");
        written += 1;
    }
    tracing::debug!(dir = %target.display(), entries = written, "extraction finished");
    Ok(written)
}

/// Join an entry path onto `target`, refusing paths that would escape it.
fn enclosed_path(target: &Path, entry_path: &str) -> Result<PathBuf> {
    let mut dest = target.to_path_buf();
    for component in Path::new(entry_path).components() {
        match component {
            Component::Normal(part) => dest.push(part),
            Component::CurDir => {}
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "entry path `{entry_path}` escapes the extraction directory"
                )));
            }
        }
    }
    Ok(dest)
}
