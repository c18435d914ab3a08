//! # folio
//!
//! A book extraction engine for zip archives and expanded directories.
//!
//! ## Features
//!
//! - Treat a zip archive and a directory tree the same way through [`EntrySource`]
//! - Declare per-format options with typed defaults ([`OptionSchema`])
//! - Run parse, read and unzip flows as ordered task pipelines with progress
//! - Decrypt and re-encrypt entries through a pluggable [`CryptoProvider`],
//!   either whole-buffer or in fixed-size stream units
//! - Immutable books and items with a serializable raw form
//!
//! ## Quick Start
//!
//! ```no_run
//! use folio::formats::Comic;
//! use folio::{Book, Item, Parser};
//!
//! let mut parser = Parser::new("volume1.cbz", Comic::new());
//! let book = parser.parse(None)?;
//! println!("{} pages", book.items().len());
//!
//! let first = parser.read_item(&book.items()[0], None)?;
//! println!("first page: {} bytes", first.as_bytes().len());
//! # Ok::<(), folio::Error>(())
//! ```
//!
//! ## Encrypted Containers
//!
//! ```no_run
//! use folio::crypto::{CipherProvider, CryptorConfig, Mode};
//! use folio::formats::Comic;
//! use folio::Parser;
//!
//! let config = CryptorConfig::new(Mode::Cbc, [7u8; 16]).with_iv([9u8; 16]);
//! let provider = CipherProvider::new(config).protect_if(|path, _| path.ends_with(".png"));
//! let mut parser = Parser::new("locked.cbz", Comic::new()).with_provider(provider);
//! parser.unzip("out/locked", true)?;
//! # Ok::<(), folio::Error>(())
//! ```

pub mod crypto;
pub mod entry;
pub mod error;
pub mod formats;
pub mod io;
pub mod model;
pub mod options;
pub mod parser;
pub mod pipeline;
pub mod stream;
pub(crate) mod util;

pub use crypto::{CipherProvider, CryptoProvider, Cryptor, CryptorConfig, Mode, Purpose};
pub use entry::{Entry, EntrySource, SourceKind};
pub use error::{Error, ErrorCode, Result};
pub use model::{Book, Item, ItemBase, ItemBuilder};
pub use options::{OptionSchema, OptionType, Options, TypeSpec};
pub use parser::{Content, Format, ParseContext, Parser, ReadContext};
pub use pipeline::{Action, Phase, Pipeline, Progress, Task};
