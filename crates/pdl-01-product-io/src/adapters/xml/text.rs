//! Chunk-wise decoders for embedded content character data.
//!
//! Character data arrives in arbitrary slices; both decoders carry an
//! incomplete tail (a partial base64 quantum, a partial entity reference)
//! into the next slice.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use bytes::Bytes;

use crate::domain::errors::{ProductIoError, Result};

/// Accepts both padded and unpadded final quanta.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Longest entity reference carried between slices (`&#x10FFFF;`).
const MAX_ENTITY_LEN: usize = 10;

/// Decoder for one content element's character data.
pub(super) enum TextDecoder {
    Base64 { pending: Vec<u8> },
    Escaped { pending: Vec<u8> },
}

impl TextDecoder {
    pub(super) fn new(encoded: bool) -> Self {
        if encoded {
            TextDecoder::Base64 {
                pending: Vec::new(),
            }
        } else {
            TextDecoder::Escaped {
                pending: Vec::new(),
            }
        }
    }

    /// Decode as much of `text` as is complete.
    pub(super) fn push(&mut self, text: &[u8]) -> Result<Bytes> {
        match self {
            TextDecoder::Base64 { pending } => {
                pending.extend(text.iter().filter(|b| !b.is_ascii_whitespace()));
                let complete = pending.len() / 4 * 4;
                if complete == 0 {
                    return Ok(Bytes::new());
                }
                let decoded = BASE64
                    .decode(&pending[..complete])
                    .map_err(|e| ProductIoError::malformed(format!("invalid base64 content: {e}")))?;
                pending.drain(..complete);
                Ok(Bytes::from(decoded))
            }
            TextDecoder::Escaped { pending } => {
                pending.extend_from_slice(text);
                let split = match pending.iter().rposition(|b| *b == b'&') {
                    Some(amp) if !pending[amp..].contains(&b';') => {
                        if pending.len() - amp > MAX_ENTITY_LEN {
                            return Err(ProductIoError::malformed("unterminated entity reference"));
                        }
                        amp
                    }
                    _ => pending.len(),
                };
                let decoded = unescape(&pending[..split])?;
                pending.drain(..split);
                Ok(Bytes::from(decoded))
            }
        }
    }

    /// Decode the remaining tail at the end of the element.
    pub(super) fn finish(self) -> Result<Bytes> {
        match self {
            TextDecoder::Base64 { pending } if pending.is_empty() => Ok(Bytes::new()),
            TextDecoder::Base64 { pending } => BASE64
                .decode(&pending)
                .map(Bytes::from)
                .map_err(|e| ProductIoError::malformed(format!("invalid base64 content: {e}"))),
            TextDecoder::Escaped { pending } if pending.is_empty() => Ok(Bytes::new()),
            TextDecoder::Escaped { .. } => {
                Err(ProductIoError::malformed("unterminated entity reference"))
            }
        }
    }
}

fn unescape(input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.iter().position(|b| *b == b'&') {
        out.extend_from_slice(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .iter()
            .position(|b| *b == b';')
            .ok_or_else(|| ProductIoError::malformed("unterminated entity reference"))?;
        let name = &after[..semi];
        match name {
            b"lt" => out.push(b'<'),
            b"gt" => out.push(b'>'),
            b"amp" => out.push(b'&'),
            b"quot" => out.push(b'"'),
            b"apos" => out.push(b'\''),
            [b'#', reference @ ..] => {
                let ch = char_reference(reference).ok_or_else(|| {
                    ProductIoError::malformed(format!(
                        "invalid character reference '&{};'",
                        String::from_utf8_lossy(name)
                    ))
                })?;
                let mut utf8 = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
            }
            _ => {
                return Err(ProductIoError::malformed(format!(
                    "unknown entity '&{};'",
                    String::from_utf8_lossy(name)
                )))
            }
        }
        rest = &after[semi + 1..];
    }
    out.extend_from_slice(rest);
    Ok(out)
}

fn char_reference(reference: &[u8]) -> Option<char> {
    let text = std::str::from_utf8(reference).ok()?;
    let code = match text.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => text.parse().ok()?,
    };
    char::from_u32(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_in_slices(mut decoder: TextDecoder, input: &[u8], size: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for slice in input.chunks(size) {
            out.extend_from_slice(&decoder.push(slice)?);
        }
        out.extend_from_slice(&decoder.finish()?);
        Ok(out)
    }

    #[test]
    fn test_base64_across_slices() {
        let input = b"aGVs\nbG8g\r\n  d29y bGQ=";
        for size in 1..input.len() {
            let out = decode_in_slices(TextDecoder::new(true), input, size).unwrap();
            assert_eq!(out, b"hello world", "slice size {size}");
        }
    }

    #[test]
    fn test_base64_unpadded_tail() {
        let out = decode_in_slices(TextDecoder::new(true), b"YWI", 2).unwrap();
        assert_eq!(out, b"ab");
    }

    #[test]
    fn test_base64_invalid() {
        assert!(decode_in_slices(TextDecoder::new(true), b"!!!!", 4).is_err());
    }

    #[test]
    fn test_entities_across_slices() {
        let input = b"a &lt; b &amp;&amp; c &#x3e; &#233;";
        for size in 1..input.len() {
            let out = decode_in_slices(TextDecoder::new(false), input, size).unwrap();
            assert_eq!(out, "a < b && c > \u{e9}".as_bytes(), "slice size {size}");
        }
    }

    #[test]
    fn test_unknown_and_unterminated_entities() {
        assert!(decode_in_slices(TextDecoder::new(false), b"&bogus;", 64).is_err());
        assert!(decode_in_slices(TextDecoder::new(false), b"tail &am", 64).is_err());
        assert!(decode_in_slices(TextDecoder::new(false), b"& not an entity at all", 64).is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_base64_slicing_is_invisible(
            data in proptest::collection::vec(proptest::num::u8::ANY, 0..512),
            size in 1usize..64,
        ) {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&data);
            let out = decode_in_slices(TextDecoder::new(true), encoded.as_bytes(), size).unwrap();
            proptest::prop_assert_eq!(out, data);
        }
    }
}
