//! Payload decoder for the obfuscated transport format
//!
//! The server ships reference tables as a string of decimal digits plus a
//! timestamp. The first seven digits of the timestamp form a shift; every
//! seven-character chunk of the payload, minus that shift, is one UTF-16
//! code unit of the JSON document. This is obfuscation, not encryption.

use thiserror::Error;

/// Width of one encoded code unit, and of the shift prefix.
pub const CHUNK_WIDTH: usize = 7;

/// Failure to turn an encoded payload back into text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("timestamp has {digits} digits, need at least 7")]
    TimestampTooShort { digits: usize },

    #[error("chunk {chunk:?} at offset {offset} is not a decimal integer")]
    InvalidChunk { offset: usize, chunk: String },

    #[error("decoded code units are not valid UTF-16")]
    InvalidUtf16,
}

/// Derive the shift from the decimal form of `epoch_seconds`.
fn shift_for(epoch_seconds: i64) -> Result<i64, DecodeError> {
    let digits = epoch_seconds.to_string();
    let len = digits.chars().count();
    if len < CHUNK_WIDTH {
        return Err(DecodeError::TimestampTooShort { digits: len });
    }
    let prefix: String = digits.chars().take(CHUNK_WIDTH).collect();
    // A leading '-' leaves six digits, which still parses.
    prefix.parse::<i64>().map_err(|_| DecodeError::InvalidChunk {
        offset: 0,
        chunk: prefix,
    })
}

/// Decode an obfuscated digit string into the original text.
///
/// A trailing chunk shorter than seven characters is parsed as a smaller
/// integer rather than dropped, matching the transport contract.
pub fn decode(obfuscated: &str, epoch_seconds: i64) -> Result<String, DecodeError> {
    let shift = shift_for(epoch_seconds)?;

    let chars: Vec<char> = obfuscated.chars().collect();
    let mut units = Vec::with_capacity(chars.len() / CHUNK_WIDTH + 1);
    for (index, chunk) in chars.chunks(CHUNK_WIDTH).enumerate() {
        let chunk: String = chunk.iter().collect();
        let value = chunk
            .parse::<i64>()
            .map_err(|_| DecodeError::InvalidChunk {
                offset: index * CHUNK_WIDTH,
                chunk: chunk.clone(),
            })?;
        // Code units wrap modulo 2^16, like a UTF-16 char code conversion.
        units.push((value - shift).rem_euclid(1 << 16) as u16);
    }

    String::from_utf16(&units).map_err(|_| DecodeError::InvalidUtf16)
}

/// Inverse of [`decode`]; only used to build fixtures.
///
/// Every UTF-16 unit `u` becomes `u + shift`, zero-padded to seven digits.
pub fn encode(text: &str, epoch_seconds: i64) -> Result<String, DecodeError> {
    let shift = shift_for(epoch_seconds)?;
    Ok(text
        .encode_utf16()
        .map(|unit| {
            let value = i64::from(unit) + shift;
            format!("{value:07}")
        })
        .collect())
}
