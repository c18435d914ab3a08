use std::ops::Range;

use crate::entry::EntrySource;
use crate::error::{Error, Result};
use crate::model::Book;
use crate::options::Options;

/// State threaded through one `parse()` run.
pub struct ParseContext<B: Book> {
    pub options: Options,
    pub entries: Option<EntrySource>,
    /// Fields accumulated by the format's tasks.
    pub raw: B::Raw,
    /// Set by the final task from `raw`.
    pub book: Option<B>,
}

impl<B: Book> Default for ParseContext<B> {
    fn default() -> Self {
        Self {
            options: Options::default(),
            entries: None,
            raw: B::Raw::default(),
            book: None,
        }
    }
}

impl<B: Book> ParseContext<B> {
    /// The opened entry source; fails if no task has opened it yet.
    pub fn entries(&self) -> Result<&EntrySource> {
        self.entries
            .as_ref()
            .ok_or_else(|| Error::MissingElement("entry source".into()))
    }
}

/// Decoded result of reading one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Bytes(Vec<u8>),
    Text(String),
}

impl Content {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Bytes(bytes) => bytes,
            Content::Text(text) => text.as_bytes(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Bytes(_) => None,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Content::Bytes(bytes) => bytes,
            Content::Text(text) => text.into_bytes(),
        }
    }
}

/// State threaded through one `read_item()` / `read_items()` run.
pub struct ReadContext<I> {
    pub options: Options,
    pub entries: Option<EntrySource>,
    /// Requested items, in caller order.
    pub items: Vec<I>,
    /// Byte range every item is read with, taken from the `range` option.
    pub range: Option<Range<u64>>,
    /// One entry per item once the contents are loaded.
    pub contents: Vec<Content>,
}

impl<I> ReadContext<I> {
    pub fn new(items: Vec<I>) -> Self {
        Self {
            options: Options::default(),
            entries: None,
            items,
            range: None,
            contents: Vec::new(),
        }
    }

    pub fn entries(&self) -> Result<&EntrySource> {
        self.entries
            .as_ref()
            .ok_or_else(|| Error::MissingElement("entry source".into()))
    }
}
