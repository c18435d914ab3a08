use std::rc::Rc;

use super::{
    BLOCK_SIZE, CryptOptions, CryptoProvider, Cryptor, CryptorCache, CryptorConfig, DEFAULT_BUFFER_SIZE, Padding,
    Purpose,
};
use crate::error::{Error, Result};

type PathFilter = Box<dyn Fn(&str, Purpose) -> bool>;

/// A [`CryptoProvider`] backed by one AES configuration.
///
/// Reads decrypt and writes encrypt. A separate configuration can be given for
/// writes, and a filter can leave some paths unprotected.
///
/// In stream mode every `buffer_size` unit of an entry is an independent
/// message. Only the last unit of an entry is padded, so ECB and CBC work on
/// entries of any length while every other unit stays block aligned.
pub struct CipherProvider {
    read_config: CryptorConfig,
    write_config: Option<CryptorConfig>,
    padding: Padding,
    stream_mode: bool,
    buffer_size: usize,
    filter: Option<PathFilter>,
    cache: CryptorCache,
}

impl CipherProvider {
    pub fn new(config: CryptorConfig) -> Self {
        Self {
            read_config: config,
            write_config: None,
            padding: Padding::Pkcs7,
            stream_mode: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            filter: None,
            cache: CryptorCache::new(),
        }
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    /// Key material used for [`Purpose::Write`] instead of the read config.
    pub fn with_write_config(mut self, config: CryptorConfig) -> Self {
        self.write_config = Some(config);
        self
    }

    /// Only protect paths for which `filter` returns `true`.
    pub fn protect_if(mut self, filter: impl Fn(&str, Purpose) -> bool + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Switch to stream mode with units of `buffer_size` bytes.
    pub fn stream_mode(mut self, buffer_size: usize) -> Result<Self> {
        if buffer_size == 0 || buffer_size % BLOCK_SIZE != 0 {
            return Err(Error::InvalidArgument(format!(
                "stream buffer size must be a non-zero multiple of {BLOCK_SIZE}, got {buffer_size}"
            )));
        }
        self.stream_mode = true;
        self.buffer_size = buffer_size;
        Ok(self)
    }

    pub fn protects(&self, file_path: &str, purpose: Purpose) -> bool {
        self.filter.as_ref().is_none_or(|f| f(file_path, purpose))
    }

    pub fn cached_cryptors(&self) -> usize {
        self.cache.len()
    }
}

impl CryptoProvider for CipherProvider {
    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn is_stream_mode(&self) -> bool {
        self.stream_mode
    }

    fn cryptor(&self, file_path: &str, purpose: Purpose) -> Result<Rc<Cryptor>> {
        self.cache.get_or_try_insert_with(file_path, purpose, || {
            let config = match (purpose, &self.write_config) {
                (Purpose::Write, Some(write)) => write,
                _ => &self.read_config,
            };
            tracing::debug!(path = file_path, ?purpose, mode = ?config.mode, "creating cryptor");
            Cryptor::new(config.clone())
        })
    }

    fn run(&self, data: Vec<u8>, file_path: &str, purpose: Purpose) -> Result<Vec<u8>> {
        self.apply(data, file_path, purpose, self.padding)
    }

    fn run_unit(&self, data: Vec<u8>, file_path: &str, purpose: Purpose, last: bool) -> Result<Vec<u8>> {
        let padding = if last || !self.stream_mode { self.padding } else { Padding::None };
        self.apply(data, file_path, purpose, padding)
    }
}

impl CipherProvider {
    fn apply(&self, data: Vec<u8>, file_path: &str, purpose: Purpose, padding: Padding) -> Result<Vec<u8>> {
        if !self.protects(file_path, purpose) {
            return Ok(data);
        }
        let cryptor = self.cryptor(file_path, purpose)?;
        let options = CryptOptions::new(padding);
        match purpose {
            Purpose::Write => cryptor.encrypt(&data, &options),
            Purpose::ReadInArchive | Purpose::ReadInDirectory => cryptor.decrypt(&data, &options),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Mode, run_entry};

    fn config() -> CryptorConfig {
        CryptorConfig::new(Mode::Cbc, b"sixteen byte key".to_vec()).with_iv(vec![9u8; 16])
    }

    #[test]
    fn test_write_then_read_round_trips() {
        let provider = CipherProvider::new(config());
        let sealed = provider.run(b"page data".to_vec(), "p1.png", Purpose::Write).unwrap();
        assert_ne!(sealed, b"page data");
        let opened = provider.run(sealed, "p1.png", Purpose::ReadInDirectory).unwrap();
        assert_eq!(opened, b"page data");
    }

    #[test]
    fn test_cryptor_is_cached_per_path_and_purpose() {
        let provider = CipherProvider::new(config());
        let a = provider.cryptor("p1.png", Purpose::ReadInArchive).unwrap();
        let b = provider.cryptor("p1.png", Purpose::ReadInArchive).unwrap();
        let c = provider.cryptor("p1.png", Purpose::ReadInDirectory).unwrap();
        let d = provider.cryptor("p2.png", Purpose::ReadInArchive).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert!(!Rc::ptr_eq(&a, &c));
        assert!(!Rc::ptr_eq(&a, &d));
        assert_eq!(provider.cached_cryptors(), 3);
    }

    #[test]
    fn test_filtered_paths_pass_through() {
        let provider = CipherProvider::new(config()).protect_if(|path, _| path.ends_with(".png"));
        let data = provider.run(b"plain".to_vec(), "info.txt", Purpose::ReadInArchive).unwrap();
        assert_eq!(data, b"plain");
        assert_eq!(provider.cached_cryptors(), 0);
    }

    #[test]
    fn test_write_config_uses_its_own_key() {
        let write = CryptorConfig::new(Mode::Ecb, b"another 16B key!".to_vec());
        let provider = CipherProvider::new(config()).with_write_config(write);
        let sealed = provider.run(b"x".to_vec(), "a", Purpose::Write).unwrap();
        let misread = provider.run(sealed, "a", Purpose::ReadInArchive);
        assert!(!matches!(misread, Ok(ref data) if data == b"x"));
        assert_eq!(provider.cryptor("a", Purpose::Write).unwrap().mode(), Mode::Ecb);
    }

    #[test]
    fn test_cbc_stream_mode_pads_only_the_last_unit() {
        let provider = CipherProvider::new(config()).stream_mode(32).unwrap();
        let plain: Vec<u8> = (0..100u8).collect();

        let sealed = run_entry(&provider, plain.clone(), "p1.png", Purpose::Write).unwrap();
        // three full units, then 4 bytes padded to one block
        assert_eq!(sealed.len(), 3 * 32 + 16);
        let opened = run_entry(&provider, sealed.clone(), "p1.png", Purpose::ReadInArchive).unwrap();
        assert_eq!(opened, plain);

        // units are independent messages: the second decrypts on its own
        let second = provider.run_unit(sealed[32..64].to_vec(), "p1.png", Purpose::ReadInArchive, false).unwrap();
        assert_eq!(second, &plain[32..64]);
    }

    #[test]
    fn test_stream_write_of_whole_units_ends_with_a_pad_block() {
        let provider = CipherProvider::new(config()).stream_mode(32).unwrap();
        let plain = vec![7u8; 64];
        let sealed = run_entry(&provider, plain.clone(), "p1.png", Purpose::Write).unwrap();
        assert_eq!(sealed.len(), 64 + 16);
        assert_eq!(run_entry(&provider, sealed, "p1.png", Purpose::ReadInDirectory).unwrap(), plain);
    }

    #[test]
    fn test_stream_mode_requires_block_multiple() {
        assert!(CipherProvider::new(config()).stream_mode(100).is_err());
        let provider = CipherProvider::new(config()).stream_mode(64).unwrap();
        assert!(provider.is_stream_mode());
        assert_eq!(provider.buffer_size(), 64);
    }
}
