//! Pluggable per-entry encryption.
//!
//! A [`CryptoProvider`] decides, per `(file path, purpose)`, whether and how a
//! buffer is transformed. Readers never look up cryptors themselves; they hand
//! each physical read unit to [`CryptoProvider::run`], or to
//! [`CryptoProvider::run_unit`] in stream mode.
//!
//! Providers keep their cryptors in a [`CryptorCache`] so the same
//! `(path, purpose)` always yields the same [`Cryptor`] instance.

mod cryptor;
mod encoding;
mod padding;
mod provider;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub use cryptor::{CryptOptions, Cryptor, CryptorConfig, Mode};
pub use encoding::Encoding;
pub use padding::{BLOCK_SIZE, Padding};
pub use provider::CipherProvider;

use crate::error::Result;

/// Default unit size for stream-mode providers.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Why a provider is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    ReadInArchive,
    ReadInDirectory,
    Write,
}

/// Key management and cipher policy for one parser.
pub trait CryptoProvider {
    /// Unit size, in stored bytes, that [`run`](Self::run) receives in stream mode.
    fn buffer_size(&self) -> usize {
        DEFAULT_BUFFER_SIZE
    }

    /// `true` when every `buffer_size` unit can be transformed on its own;
    /// `false` when whole entries must be buffered first.
    fn is_stream_mode(&self) -> bool {
        false
    }

    /// The cryptor for `(file_path, purpose)`, created on first use.
    fn cryptor(&self, file_path: &str, purpose: Purpose) -> Result<Rc<Cryptor>>;

    /// Transform one read or write unit.
    fn run(&self, data: Vec<u8>, file_path: &str, purpose: Purpose) -> Result<Vec<u8>>;

    /// Transform one stream-mode unit. `last` marks the unit that ends the
    /// entry, the only one that carries padding.
    fn run_unit(&self, data: Vec<u8>, file_path: &str, purpose: Purpose, last: bool) -> Result<Vec<u8>> {
        let _ = last;
        self.run(data, file_path, purpose)
    }
}

/// Run `provider` over a whole entry, unit by unit in stream mode.
///
/// Stored entries are split into `buffer_size` units and the final one is
/// marked last. Plain data for [`Purpose::Write`] is split so that its final
/// unit is shorter than `buffer_size`, possibly empty; padding it then never
/// reaches past the unit boundary, which keeps every stored unit but the
/// last exactly `buffer_size` bytes long.
pub fn run_entry(provider: &dyn CryptoProvider, data: Vec<u8>, file_path: &str, purpose: Purpose) -> Result<Vec<u8>> {
    if !provider.is_stream_mode() {
        return provider.run(data, file_path, purpose);
    }
    let unit = provider.buffer_size().max(1);
    let units = match purpose {
        Purpose::Write => data.len() / unit + 1,
        Purpose::ReadInArchive | Purpose::ReadInDirectory => data.len().div_ceil(unit),
    };

    let mut out = Vec::with_capacity(data.len() + BLOCK_SIZE);
    for i in 0..units {
        let start = i * unit;
        let end = (start + unit).min(data.len());
        out.extend(provider.run_unit(data[start..end].to_vec(), file_path, purpose, i + 1 == units)?);
    }
    Ok(out)
}

/// Cryptors keyed by `(file path, purpose)`, owned by one provider.
///
/// Not synchronized: a provider serves one pipeline at a time.
#[derive(Default)]
pub struct CryptorCache {
    cryptors: RefCell<HashMap<(String, Purpose), Rc<Cryptor>>>,
}

impl CryptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached cryptor for the key, or the result of `make` stored under it.
    pub fn get_or_try_insert_with<F>(&self, file_path: &str, purpose: Purpose, make: F) -> Result<Rc<Cryptor>>
    where
        F: FnOnce() -> Result<Cryptor>,
    {
        let key = (file_path.to_string(), purpose);
        if let Some(cryptor) = self.cryptors.borrow().get(&key) {
            return Ok(Rc::clone(cryptor));
        }

        let cryptor = Rc::new(make()?);
        self.cryptors.borrow_mut().insert(key, Rc::clone(&cryptor));
        Ok(cryptor)
    }

    pub fn len(&self) -> usize {
        self.cryptors.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
