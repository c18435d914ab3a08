//! Formats built on the parser engine.

mod comic;

pub use comic::{Comic, ComicBook, ComicItem, RawComicBook, RawComicItem};
