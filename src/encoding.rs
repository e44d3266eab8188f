//! Value encoding for the sender.

use std::num::ParseIntError;

use clap::ValueEnum;

/// How the sender turns its value argument into a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueEncoding {
    /// Raw UTF-8 bytes of the argument.
    String,
    /// 4-byte big-endian two's-complement signed integer.
    Int,
}

impl ValueEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueEncoding::String => "string",
            ValueEncoding::Int => "int",
        }
    }
}

/// Errors from encoding a value.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("invalid int value '{value}': {source}")]
    InvalidInt {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Encode `value` according to `encoding`.
pub fn encode(encoding: ValueEncoding, value: &str) -> Result<Vec<u8>, EncodeError> {
    match encoding {
        ValueEncoding::String => Ok(value.as_bytes().to_vec()),
        ValueEncoding::Int => {
            let parsed: i32 = value.parse().map_err(|source| EncodeError::InvalidInt {
                value: value.to_string(),
                source,
            })?;
            Ok(parsed.to_be_bytes().to_vec())
        }
    }
}

/// Decode a 4-byte big-endian integer body. Returns `None` for any other length.
pub fn decode_int(body: &[u8]) -> Option<i32> {
    let bytes: [u8; 4] = body.try_into().ok()?;
    Some(i32::from_be_bytes(bytes))
}
