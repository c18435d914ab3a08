use std::io::Read;
use std::sync::Arc;

use zip::ZipArchive;
use zip::result::ZipError;

use super::{EntryStore, SourceKind};
use crate::error::{Error, Result};
use crate::io::{ByteSource, ByteSourceCursor};

/// Zip members, indexed once when the archive is opened.
pub(crate) struct ArchiveStore {
    archive: ZipArchive<ByteSourceCursor>,
}

impl ArchiveStore {
    /// Open the archive and list its files as `(path, size)` in
    /// central-directory order. Directory members are skipped.
    pub(crate) fn open(source: Arc<dyn ByteSource>) -> Result<(Self, Vec<(String, u64)>)> {
        let mut archive = ZipArchive::new(ByteSourceCursor::new(source))?;

        let mut listing = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive.by_index_raw(i)?;
            if file.is_dir() {
                continue;
            }
            listing.push((file.name().to_string(), file.size()));
        }

        Ok((Self { archive }, listing))
    }
}

impl EntryStore for ArchiveStore {
    fn kind(&self) -> SourceKind {
        SourceKind::Archive
    }

    fn read_with(&self, path: &str, f: &mut dyn FnMut(&mut dyn Read) -> Result<Vec<u8>>) -> Result<Vec<u8>> {
        // Clones share the parsed central directory; only the cursor is new.
        let mut archive = self.archive.clone();
        let mut file = archive.by_name(path).map_err(|e| match e {
            ZipError::FileNotFound => Error::NoSuchFile(path.to_string()),
            other => Error::Zip(other),
        })?;
        f(&mut file)
    }
}
