//! Block padding applied around the cipher modes.

use crate::error::{Error, Result};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// How plaintext is extended to a whole number of blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding {
    /// PKCS#7: always adds 1..=16 bytes, each holding the pad length.
    #[default]
    Pkcs7,
    /// No padding. The caller guarantees block alignment where the mode
    /// needs it, e.g. mid-stream chunks of a larger padded message.
    None,
}

impl Padding {
    pub(crate) fn pad(self, data: &mut Vec<u8>) {
        if self == Padding::Pkcs7 {
            let n = BLOCK_SIZE - data.len() % BLOCK_SIZE;
            data.resize(data.len() + n, n as u8);
        }
    }

    pub(crate) fn unpad(self, data: &mut Vec<u8>) -> Result<()> {
        if self == Padding::None {
            return Ok(());
        }
        let n = match data.last() {
            Some(&n) => n as usize,
            None => return Err(Error::cryptor("PKCS#7 unpad of empty buffer")),
        };
        if n == 0 || n > BLOCK_SIZE || n > data.len() {
            return Err(Error::cryptor(format!("invalid PKCS#7 pad length {n}")));
        }
        if data[data.len() - n..].iter().any(|&b| b as usize != n) {
            return Err(Error::cryptor("corrupt PKCS#7 padding"));
        }
        data.truncate(data.len() - n);
        Ok(())
    }
}
