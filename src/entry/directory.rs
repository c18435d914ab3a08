use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{EntryStore, SourceKind};
use crate::error::{Error, Result};

/// Files under an expanded directory.
pub(crate) struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Walk `root` recursively and list regular files as `(path, size)`,
    /// with `/`-separated paths relative to `root`. Names are visited in
    /// sorted order, so the listing is stable between calls.
    pub(crate) fn open(root: &Path) -> Result<(Self, Vec<(String, u64)>)> {
        let mut listing = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let size = entry.metadata().map_err(io::Error::from)?.len();
            listing.push((path, size));
        }

        Ok((
            Self {
                root: root.to_path_buf(),
            },
            listing,
        ))
    }
}

impl EntryStore for DirectoryStore {
    fn kind(&self) -> SourceKind {
        SourceKind::Directory
    }

    fn read_with(&self, path: &str, f: &mut dyn FnMut(&mut dyn Read) -> Result<Vec<u8>>) -> Result<Vec<u8>> {
        let file = File::open(self.root.join(path)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NoSuchFile(path.to_string()),
            _ => Error::Io(e),
        })?;
        f(&mut BufReader::new(file))
    }
}
