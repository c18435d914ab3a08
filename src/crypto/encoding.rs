//! Text forms accepted and produced by a cryptor.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Error, Result};

/// How a byte buffer is represented on either side of a cryptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Bytes are used as they are.
    #[default]
    Raw,
    /// ASCII hexadecimal text, two digits per byte.
    Hex,
    /// Standard base64 text.
    Base64,
    /// UTF-8 text. Decoding is a no-op; encoding validates the output.
    Utf8,
}

impl Encoding {
    /// Turn a buffer in this encoding into raw bytes.
    pub fn decode(self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Encoding::Raw | Encoding::Utf8 => Ok(input.to_vec()),
            Encoding::Hex => hex::decode(input.trim_ascii())
                .map_err(|e| Error::InvalidArgument(format!("bad hex input: {e}"))),
            Encoding::Base64 => STANDARD
                .decode(input.trim_ascii())
                .map_err(|e| Error::InvalidArgument(format!("bad base64 input: {e}"))),
        }
    }

    /// Turn raw bytes into a buffer in this encoding.
    pub fn encode(self, raw: Vec<u8>) -> Result<Vec<u8>> {
        match self {
            Encoding::Raw => Ok(raw),
            Encoding::Hex => Ok(hex::encode(raw).into_bytes()),
            Encoding::Base64 => Ok(STANDARD.encode(raw).into_bytes()),
            Encoding::Utf8 => String::from_utf8(raw)
                .map(String::into_bytes)
                .map_err(|e| Error::InvalidArgument(format!("output is not UTF-8: {e}"))),
        }
    }
}
