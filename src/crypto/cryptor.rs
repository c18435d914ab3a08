//! AES encrypt/decrypt units under a configured mode of operation.

use std::fmt;
use std::str::FromStr;

use cipher::block_padding::NoPadding;
use cipher::{AsyncStreamCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit, StreamCipher};

use super::encoding::Encoding;
use super::padding::{BLOCK_SIZE, Padding};
use crate::error::{Error, Result};

/// Block-cipher mode of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Electronic codebook. The only mode without an IV.
    Ecb,
    /// Cipher-block chaining.
    Cbc,
    /// Full-block cipher feedback.
    Cfb,
    /// Output feedback.
    Ofb,
    /// Counter mode with a 128-bit big-endian counter.
    Ctr,
}

impl Mode {
    pub fn needs_iv(self) -> bool {
        self != Mode::Ecb
    }

    /// Whether the mode only works on whole blocks.
    pub fn is_block_aligned(self) -> bool {
        matches!(self, Mode::Ecb | Mode::Cbc)
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ecb" => Ok(Mode::Ecb),
            "cbc" => Ok(Mode::Cbc),
            "cfb" => Ok(Mode::Cfb),
            "ofb" => Ok(Mode::Ofb),
            "ctr" => Ok(Mode::Ctr),
            other => Err(Error::InvalidArgument(format!("unknown cipher mode `{other}`"))),
        }
    }
}

/// Key material for building a [`Cryptor`].
#[derive(Clone, PartialEq, Eq)]
pub struct CryptorConfig {
    pub mode: Mode,
    pub key: Vec<u8>,
    pub iv: Option<Vec<u8>>,
}

impl fmt::Debug for CryptorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptorConfig")
            .field("mode", &self.mode)
            .field("key_len", &self.key.len())
            .field("has_iv", &self.iv.is_some())
            .finish()
    }
}

impl CryptorConfig {
    pub fn new(mode: Mode, key: impl Into<Vec<u8>>) -> Self {
        Self {
            mode,
            key: key.into(),
            iv: None,
        }
    }

    pub fn with_iv(mut self, iv: impl Into<Vec<u8>>) -> Self {
        self.iv = Some(iv.into());
        self
    }

    /// Build a config from key and IV given as text, e.g. hex strings.
    pub fn from_encoded(mode: Mode, key: &str, iv: Option<&str>, encoding: Encoding) -> Result<Self> {
        Ok(Self {
            mode,
            key: encoding.decode(key.as_bytes())?,
            iv: iv.map(|iv| encoding.decode(iv.as_bytes())).transpose()?,
        })
    }
}

/// Per-call options for [`Cryptor::encrypt`] and [`Cryptor::decrypt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CryptOptions {
    pub padding: Padding,
    /// Encoding of the buffer handed to the cryptor.
    pub input: Encoding,
    /// Encoding of the buffer returned by the cryptor.
    pub output: Encoding,
}

impl CryptOptions {
    pub fn new(padding: Padding) -> Self {
        Self {
            padding,
            ..Self::default()
        }
    }

    pub fn input(mut self, encoding: Encoding) -> Self {
        self.input = encoding;
        self
    }

    pub fn output(mut self, encoding: Encoding) -> Self {
        self.output = encoding;
        self
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

/// Run `$body` with `$alias` bound to the AES variant matching the key length.
macro_rules! with_aes {
    ($key:expr, $alias:ident => $body:expr) => {
        match $key.len() {
            16 => {
                type $alias = aes::Aes128;
                $body
            }
            24 => {
                type $alias = aes::Aes192;
                $body
            }
            32 => {
                type $alias = aes::Aes256;
                $body
            }
            n => Err(Error::cryptor(format!("unsupported key length {n}"))),
        }
    };
}

/// An AES encrypt/decrypt unit. Key size (128/192/256) follows the key length.
pub struct Cryptor {
    mode: Mode,
    key: Vec<u8>,
    iv: [u8; BLOCK_SIZE],
}

impl fmt::Debug for Cryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cryptor")
            .field("mode", &self.mode)
            .field("bits", &(self.key.len() * 8))
            .finish()
    }
}

impl Cryptor {
    pub fn new(config: CryptorConfig) -> Result<Self> {
        if !matches!(config.key.len(), 16 | 24 | 32) {
            return Err(Error::InvalidArgument(format!(
                "AES key must be 16, 24 or 32 bytes, got {}",
                config.key.len()
            )));
        }

        let mut iv = [0u8; BLOCK_SIZE];
        match (&config.iv, config.mode.needs_iv()) {
            (Some(given), true) => {
                if given.len() != BLOCK_SIZE {
                    return Err(Error::InvalidArgument(format!(
                        "IV must be {BLOCK_SIZE} bytes, got {}",
                        given.len()
                    )));
                }
                iv.copy_from_slice(given);
            }
            (None, true) => return Err(Error::MissingParameter("iv".into())),
            (_, false) => {}
        }

        Ok(Self {
            mode: config.mode,
            key: config.key,
            iv,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn encrypt(&self, input: &[u8], options: &CryptOptions) -> Result<Vec<u8>> {
        let mut buf = options.input.decode(input)?;
        options.padding.pad(&mut buf);
        self.apply(&mut buf, Direction::Encrypt)?;
        options.output.encode(buf)
    }

    pub fn decrypt(&self, input: &[u8], options: &CryptOptions) -> Result<Vec<u8>> {
        let mut buf = options.input.decode(input)?;
        self.apply(&mut buf, Direction::Decrypt)?;
        options.padding.unpad(&mut buf)?;
        options.output.encode(buf)
    }

    fn apply(&self, buf: &mut [u8], direction: Direction) -> Result<()> {
        if self.mode.is_block_aligned() && buf.len() % BLOCK_SIZE != 0 {
            return Err(Error::cryptor(format!(
                "{:?} needs whole {BLOCK_SIZE}-byte blocks, got {} bytes",
                self.mode,
                buf.len()
            )));
        }

        let (key, iv) = (self.key.as_slice(), self.iv.as_slice());
        let len = buf.len();
        with_aes!(key, C => match (self.mode, direction) {
            (Mode::Ecb, Direction::Encrypt) => ecb::Encryptor::<C>::new_from_slice(key)
                .map_err(|e| Error::cryptor_caused("key", e))?
                .encrypt_padded_mut::<NoPadding>(buf, len)
                .map(|_| ())
                .map_err(|e| Error::cryptor_caused("ecb encrypt", e)),
            (Mode::Ecb, Direction::Decrypt) => ecb::Decryptor::<C>::new_from_slice(key)
                .map_err(|e| Error::cryptor_caused("key", e))?
                .decrypt_padded_mut::<NoPadding>(buf)
                .map(|_| ())
                .map_err(|e| Error::cryptor_caused("ecb decrypt", e)),
            (Mode::Cbc, Direction::Encrypt) => cbc::Encryptor::<C>::new_from_slices(key, iv)
                .map_err(|e| Error::cryptor_caused("key/iv", e))?
                .encrypt_padded_mut::<NoPadding>(buf, len)
                .map(|_| ())
                .map_err(|e| Error::cryptor_caused("cbc encrypt", e)),
            (Mode::Cbc, Direction::Decrypt) => cbc::Decryptor::<C>::new_from_slices(key, iv)
                .map_err(|e| Error::cryptor_caused("key/iv", e))?
                .decrypt_padded_mut::<NoPadding>(buf)
                .map(|_| ())
                .map_err(|e| Error::cryptor_caused("cbc decrypt", e)),
            (Mode::Cfb, Direction::Encrypt) => {
                cfb_mode::Encryptor::<C>::new_from_slices(key, iv)
                    .map_err(|e| Error::cryptor_caused("key/iv", e))?
                    .encrypt(buf);
                Ok(())
            }
            (Mode::Cfb, Direction::Decrypt) => {
                cfb_mode::Decryptor::<C>::new_from_slices(key, iv)
                    .map_err(|e| Error::cryptor_caused("key/iv", e))?
                    .decrypt(buf);
                Ok(())
            }
            // OFB and CTR are symmetric keystream modes.
            (Mode::Ofb, _) => {
                ofb::Ofb::<C>::new_from_slices(key, iv)
                    .map_err(|e| Error::cryptor_caused("key/iv", e))?
                    .apply_keystream(buf);
                Ok(())
            }
            (Mode::Ctr, _) => {
                ctr::Ctr128BE::<C>::new_from_slices(key, iv)
                    .map_err(|e| Error::cryptor_caused("key/iv", e))?
                    .apply_keystream(buf);
                Ok(())
            }
        })
    }
}
