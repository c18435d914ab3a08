//! Uniform, lazy access to the files of a container.
//!
//! An [`EntrySource`] lists the files of either a zip archive or an expanded
//! directory. Both look the same to callers: an ordered list of [`Entry`]s,
//! each with a path, a size and a reader that decrypts through the parser's
//! [`CryptoProvider`] on demand.

mod archive;
mod directory;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::ops::Range;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use crate::crypto::{CryptoProvider, Purpose};
use crate::error::{Error, Result};
use crate::io::{ByteSource, FileSource, MemorySource};
use crate::stream::{ChunkStreamExt, READ_CHUNK_SIZE, ReadChunks, align_range, slice_buffer};
use crate::util::normalize_path;

use archive::ArchiveStore;
use directory::DirectoryStore;

/// What backs an [`EntrySource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Archive,
    Directory,
}

impl SourceKind {
    /// Purpose passed to the crypto provider when reading from this kind.
    pub fn read_purpose(self) -> Purpose {
        match self {
            SourceKind::Archive => Purpose::ReadInArchive,
            SourceKind::Directory => Purpose::ReadInDirectory,
        }
    }
}

/// Backend shared by every entry of one source.
pub(crate) trait EntryStore {
    fn kind(&self) -> SourceKind;

    /// Open the stored bytes of `path` and hand the reader to `f`.
    fn read_with(&self, path: &str, f: &mut dyn FnMut(&mut dyn Read) -> Result<Vec<u8>>) -> Result<Vec<u8>>;
}

/// One file inside a container.
#[derive(Clone)]
pub struct Entry {
    path: String,
    size: u64,
    store: Rc<dyn EntryStore>,
    provider: Option<Rc<dyn CryptoProvider>>,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("kind", &self.store.kind())
            .finish()
    }
}

impl Entry {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Stored size in bytes, before decryption.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read the decrypted bytes in `range`, or the whole entry.
    ///
    /// A whole-buffer provider sees the complete stored entry once and the
    /// range is cut from its output. A stream-mode provider only sees the
    /// `buffer_size` units covering the range, and reading stops after the
    /// last of them; the unit reaching the entry's stored size is passed as
    /// the last one. Every call starts from the stored bytes again.
    pub fn read(&self, range: Option<Range<u64>>) -> Result<Vec<u8>> {
        if let Some(r) = &range
            && r.start > r.end
        {
            return Err(Error::InvalidArgument(format!(
                "range start {} is past its end {}",
                r.start, r.end
            )));
        }
        let purpose = self.store.kind().read_purpose();

        match &self.provider {
            None => {
                let wanted = range.unwrap_or(0..u64::MAX);
                self.store.read_with(&self.path, &mut |reader: &mut dyn Read| {
                    ReadChunks::new(reader, READ_CHUNK_SIZE).slice(wanted.clone()).concat()
                })
            }
            Some(provider) if !provider.is_stream_mode() => {
                let plain = provider.run(self.read_raw()?, &self.path, purpose)?;
                Ok(match range {
                    Some(r) => slice_buffer(plain, &r),
                    None => plain,
                })
            }
            Some(provider) => {
                let unit = provider.buffer_size();
                let wanted = range.unwrap_or(0..u64::MAX);
                let aligned = align_range(&wanted, unit as u64);
                let trim = (wanted.start - aligned.start)..(wanted.end - aligned.start);
                tracing::trace!(path = %self.path, ?wanted, ?aligned, "stream read");

                self.store.read_with(&self.path, &mut |reader: &mut dyn Read| {
                    let mut offset = aligned.start;
                    ReadChunks::new(reader, READ_CHUNK_SIZE)
                        .slice(aligned.clone())
                        .rechunk(unit)
                        .cipher(|block| {
                            offset += block.len() as u64;
                            provider.run_unit(block, &self.path, purpose, offset >= self.size)
                        })
                        .slice(trim.clone())
                        .concat()
                })
            }
        }
    }

    /// Read the stored bytes without any decryption.
    pub fn read_raw(&self) -> Result<Vec<u8>> {
        self.store.read_with(&self.path, &mut |reader: &mut dyn Read| {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            Ok(buf)
        })
    }
}

/// The ordered entries of one container.
pub struct EntrySource {
    kind: SourceKind,
    name: String,
    entries: Vec<Entry>,
    exact: HashMap<String, usize>,
    loose: HashMap<String, usize>,
}

impl fmt::Debug for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntrySource")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl EntrySource {
    /// Open `path` as a directory source if it is a directory, otherwise as
    /// a zip archive.
    pub fn open(path: &Path, provider: Option<Rc<dyn CryptoProvider>>) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|_| Error::NoSuchPath(path.display().to_string()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let source = if metadata.is_dir() {
            let (store, listing) = DirectoryStore::open(path)?;
            Self::from_store(Rc::new(store), name, listing, provider)
        } else {
            let (store, listing) = ArchiveStore::open(Arc::new(FileSource::open(path)?))?;
            Self::from_store(Rc::new(store), name, listing, provider)
        };
        tracing::debug!(path = %path.display(), kind = ?source.kind, entries = source.len(), "opened entry source");
        Ok(source)
    }

    /// Open an in-memory zip archive.
    pub fn from_archive_bytes(
        name: impl Into<String>,
        data: Vec<u8>,
        provider: Option<Rc<dyn CryptoProvider>>,
    ) -> Result<Self> {
        let source: Arc<dyn ByteSource> = Arc::new(MemorySource::new(data));
        let (store, listing) = ArchiveStore::open(source)?;
        Ok(Self::from_store(Rc::new(store), name.into(), listing, provider))
    }

    fn from_store(
        store: Rc<dyn EntryStore>,
        name: String,
        listing: Vec<(String, u64)>,
        provider: Option<Rc<dyn CryptoProvider>>,
    ) -> Self {
        let entries = listing
            .into_iter()
            .map(|(path, size)| Entry {
                path,
                size,
                store: Rc::clone(&store),
                provider: provider.clone(),
            })
            .collect();
        Self::indexed(store.kind(), name, entries)
    }

    fn indexed(kind: SourceKind, name: String, entries: Vec<Entry>) -> Self {
        let mut exact = HashMap::with_capacity(entries.len());
        let mut loose = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            exact.insert(entry.path.clone(), i);
            loose.entry(normalize_path(&entry.path)).or_insert(i);
        }
        Self {
            kind,
            name,
            entries,
            exact,
            loose,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// File stem of the opened path, e.g. `"vol1"` for `vol1.cbz`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(Entry::path).collect()
    }

    /// Resolve `path` to its entry. Strict lookup requires an exact match;
    /// otherwise the normalized forms are compared as a fallback.
    pub fn find(&self, path: &str, strict: bool) -> Result<&Entry> {
        let index = self.exact.get(path).or_else(|| {
            if strict {
                None
            } else {
                self.loose.get(&normalize_path(path))
            }
        });
        index
            .map(|&i| &self.entries[i])
            .ok_or_else(|| Error::NoSuchFile(path.to_string()))
    }

    pub fn map<T>(&self, f: impl FnMut(&Entry) -> T) -> Vec<T> {
        self.entries.iter().map(f).collect()
    }

    pub fn for_each(&self, f: impl FnMut(&Entry)) {
        self.entries.iter().for_each(f)
    }

    /// A new source with the same entries in `compare` order.
    pub fn sorted_by(self, mut compare: impl FnMut(&Entry, &Entry) -> Ordering) -> Self {
        let Self {
            kind, name, mut entries, ..
        } = self;
        entries.sort_by(|a, b| compare(a, b));
        Self::indexed(kind, name, entries)
    }
}

impl<'a> IntoIterator for &'a EntrySource {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
