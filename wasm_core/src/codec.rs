//! Base64 and URL component codecs.
//!
//! The Base64 pair mirrors the browser's `btoa`/`atob`: text is treated as a
//! sequence of Latin-1 code units mapped byte-for-byte, so characters above
//! U+00FF cannot be encoded. That restriction is kept on purpose; callers that
//! need arbitrary Unicode use the `_utf8` variants.

use std::borrow::Cow;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{
    GeneralPurpose, GeneralPurposeConfig, STANDARD, URL_SAFE_NO_PAD,
};
use base64::engine::DecodePaddingMode;
use tracing::debug;

use crate::error::ToolError;

// atob-style decoding: padding is stripped beforehand and stray low bits in
// the final quantum are ignored.
const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

/// Encodes `input` like `btoa`. Fails when a character lies outside Latin-1.
pub fn encode_base64(input: &str) -> Result<String, ToolError> {
    let mut bytes = Vec::with_capacity(input.len());
    for (index, ch) in input.chars().enumerate() {
        let code = u32::from(ch);
        if code > 0xFF {
            return Err(ToolError::Encoding(format!(
                "Invalid input for encoding: character '{ch}' at index {index} is outside the Latin-1 range"
            )));
        }
        bytes.push(code as u8);
    }
    Ok(STANDARD.encode(bytes))
}

/// Decodes `input` like `atob`, returning one char per decoded byte.
pub fn decode_base64(input: &str) -> Result<String, ToolError> {
    let bytes = forgiving_decode(input)?;
    Ok(bytes.into_iter().map(char::from).collect())
}

pub fn encode_base64_utf8(input: &str) -> String {
    STANDARD.encode(input.as_bytes())
}

pub fn decode_base64_utf8(input: &str) -> Result<String, ToolError> {
    let bytes = forgiving_decode(input)?;
    String::from_utf8(bytes)
        .map_err(|_| ToolError::Decoding("decoded bytes are not valid UTF-8".into()))
}

/// True when `input` survives a decode/encode round trip unchanged.
pub fn is_valid_base64(input: &str) -> bool {
    if input.trim().is_empty() {
        return false;
    }
    decode_base64(input)
        .and_then(|decoded| encode_base64(&decoded))
        .is_ok_and(|encoded| encoded == input)
}

/// Decodes a base64url segment (JWT style). Padding is optional and the
/// standard alphabet is tolerated for hand-edited tokens.
pub fn decode_base64url(segment: &str) -> Result<Vec<u8>, ToolError> {
    let normalized: String = segment
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|ch| match ch {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    if normalized.is_empty() {
        return Err(ToolError::Decoding("segment is empty".into()));
    }
    URL_SAFE_NO_PAD
        .decode(normalized.as_bytes())
        .map_err(|err| ToolError::Decoding(err.to_string()))
}

fn forgiving_decode(input: &str) -> Result<Vec<u8>, ToolError> {
    let mut cleaned: String = input
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '\t' | '\n' | '\r' | '\x0C'))
        .collect();
    if cleaned.len() % 4 == 0 {
        if cleaned.ends_with("==") {
            cleaned.truncate(cleaned.len() - 2);
        } else if cleaned.ends_with('=') {
            cleaned.truncate(cleaned.len() - 1);
        }
    }
    if cleaned.len() % 4 == 1 {
        return Err(ToolError::Decoding("Invalid Base64 string".into()));
    }
    FORGIVING
        .decode(cleaned.as_bytes())
        .map_err(|err| ToolError::Decoding(format!("Invalid Base64 string: {err}")))
}

/// Percent-encodes `input` with `encodeURIComponent` rules.
pub fn encode_url(input: &str) -> Result<String, ToolError> {
    if input.is_empty() {
        return Err(ToolError::empty("Input"));
    }
    debug!(len = input.len(), "url encode");
    Ok(restore_component_marks(&urlencoding::encode(input)))
}

/// Reverses [`encode_url`]. Malformed `%` escapes and escapes that do not form
/// valid UTF-8 are rejected instead of being passed through.
pub fn decode_url(input: &str) -> Result<String, ToolError> {
    if input.is_empty() {
        return Err(ToolError::empty("Input"));
    }
    check_escapes(input)?;
    urlencoding::decode(input)
        .map(Cow::into_owned)
        .map_err(|err| ToolError::Decoding(format!("Invalid URL encoding: {err}")))
}

// urlencoding escapes everything except alphanumerics and `-_.~`;
// encodeURIComponent additionally leaves `!*'()` alone.
fn restore_component_marks(encoded: &str) -> String {
    encoded
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}

fn check_escapes(input: &str) -> Result<(), ToolError> {
    let bytes = input.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] != b'%' {
            idx += 1;
            continue;
        }
        let well_formed = bytes
            .get(idx + 1..idx + 3)
            .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
        if !well_formed {
            return Err(ToolError::Decoding(format!(
                "Invalid URL encoding: malformed escape sequence at index {idx}"
            )));
        }
        idx += 3;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn printable_ascii_round_trips() {
        let printable: String = (0x20u8..0x7f).map(char::from).collect();
        for end in [0, 1, 2, 3, 17, printable.len()] {
            let sample = &printable[..end];
            let encoded = encode_base64(sample).expect("ascii encodes");
            assert_eq!(decode_base64(&encoded).expect("decodes"), sample);
        }
    }

    #[test]
    fn latin1_round_trips_but_wider_chars_fail() {
        let encoded = encode_base64("café ÿ").expect("latin-1 encodes");
        assert_eq!(decode_base64(&encoded).unwrap(), "café ÿ");
        let err = encode_base64("snow ☃").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
        assert!(err.to_string().contains("index 5"), "msg: {err}");
    }

    #[test]
    fn decode_matches_atob_forgiveness() {
        assert_eq!(decode_base64("eA==").unwrap(), "x");
        assert_eq!(decode_base64("eA").unwrap(), "x");
        assert_eq!(decode_base64(" aGVs\nbG8= ").unwrap(), "hello");
        assert_eq!(decode_base64("").unwrap(), "");
    }

    #[test]
    fn decode_rejects_bad_alphabet_and_length() {
        for bad in ["not base64!", "abcde", "eA=", "e===", "ab$d"] {
            let err = decode_base64(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Decoding, "input {bad:?}");
        }
    }

    #[test]
    fn validity_requires_exact_round_trip() {
        assert!(!is_valid_base64(""));
        assert!(!is_valid_base64("   "));
        assert!(!is_valid_base64("not base64!"));
        assert!(is_valid_base64(&encode_base64("x").unwrap()));
        assert!(is_valid_base64("aGVsbG8="));
        // Decodable, but re-encoding adds padding.
        assert!(!is_valid_base64("eA"));
    }

    #[test]
    fn utf8_variants_cover_full_unicode() {
        let encoded = encode_base64_utf8("snow ☃");
        assert_eq!(encoded, "c25vdyDimIM=");
        assert_eq!(decode_base64_utf8(&encoded).unwrap(), "snow ☃");
        let err = decode_base64_utf8("/w==").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);
    }

    #[test]
    fn base64url_accepts_missing_padding_and_std_alphabet() {
        assert_eq!(decode_base64url("eyJhIjoxfQ").unwrap(), br#"{"a":1}"#);
        assert_eq!(decode_base64url("eyJhIjoxfQ==").unwrap(), br#"{"a":1}"#);
        assert_eq!(decode_base64url("-_8").unwrap(), decode_base64url("+/8").unwrap());
        assert!(decode_base64url("***").is_err());
        assert!(decode_base64url("").is_err());
    }

    #[test]
    fn url_encoding_follows_component_rules() {
        assert_eq!(encode_url("a b+c").unwrap(), "a%20b%2Bc");
        assert_eq!(encode_url("it's (ok)!*~").unwrap(), "it's%20(ok)!*~");
        assert_eq!(encode_url("é/?&=").unwrap(), "%C3%A9%2F%3F%26%3D");
        assert_eq!(decode_url("a%20b%2Bc").unwrap(), "a b+c");
        assert_eq!(decode_url("a+b").unwrap(), "a+b");
        assert_eq!(decode_url("%C3%A9").unwrap(), "é");
    }

    #[test]
    fn url_codec_rejects_empty_and_malformed_input() {
        assert_eq!(encode_url("").unwrap_err().kind(), ErrorKind::EmptyInput);
        assert_eq!(decode_url("").unwrap_err().kind(), ErrorKind::EmptyInput);
        for bad in ["%", "%zz", "abc%4", "%C3"] {
            let err = decode_url(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Decoding, "input {bad:?}");
        }
    }
}
