//! Structural JWT decoding. Signatures are carried through opaque and never verified.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::codec;
use crate::error::ToolError;
use crate::json;

pub const INVALID_DATE: &str = "Invalid Date";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedJwt {
    pub header: Map<String, Value>,
    pub payload: Map<String, Value>,
    pub signature: String,
    pub raw: RawSegments,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawSegments {
    pub header: String,
    pub payload: String,
    pub signature: String,
}

/// Registered time claims rendered for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimTimes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    pub expired: bool,
}

pub fn parse_jwt(token: &str) -> Result<DecodedJwt, ToolError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ToolError::empty("Token"));
    }
    let parts: Vec<&str> = token.split('.').collect();
    let [header_b64, payload_b64, signature] = parts.as_slice() else {
        return Err(ToolError::Format(format!(
            "Invalid JWT format: expected 3 segments, found {}",
            parts.len()
        )));
    };
    if parts.iter().any(|part| part.is_empty()) {
        return Err(ToolError::Format(
            "Invalid JWT format: segments must not be empty".into(),
        ));
    }
    debug!(len = token.len(), "parse jwt");

    Ok(DecodedJwt {
        header: decode_segment("header", header_b64)?,
        payload: decode_segment("payload", payload_b64)?,
        signature: signature.to_string(),
        raw: RawSegments {
            header: header_b64.to_string(),
            payload: payload_b64.to_string(),
            signature: signature.to_string(),
        },
    })
}

fn decode_segment(label: &str, segment: &str) -> Result<Map<String, Value>, ToolError> {
    let bytes = codec::decode_base64url(segment)
        .map_err(|err| ToolError::Encoding(format!("Invalid {label} encoding: {err}")))?;
    let text = String::from_utf8(bytes).map_err(|_| {
        ToolError::Encoding(format!("Invalid {label} encoding: not valid UTF-8"))
    })?;
    let prefix = format!("Invalid {label} JSON");
    match json::parse_value(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ToolError::Parse {
            message: format!("{prefix}: expected a JSON object"),
            position: Some(0),
        }),
        Err(err) => Err(json::parse_error(&prefix, &text, &err)),
    }
}

/// True once `now_seconds` has reached the numeric `exp` claim. Tokens without
/// a numeric `exp` never expire.
pub fn is_expired(payload: &Map<String, Value>, now_seconds: i64) -> bool {
    match payload.get("exp").and_then(Value::as_f64) {
        Some(exp) => now_seconds as f64 >= exp,
        None => false,
    }
}

pub fn is_expired_now(payload: &Map<String, Value>) -> bool {
    is_expired(payload, Utc::now().timestamp())
}

/// Renders a NumericDate claim (seconds since the epoch) as UTC text.
pub fn format_timestamp(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_f64)
        .filter(|secs| secs.is_finite())
        .and_then(|secs| DateTime::<Utc>::from_timestamp_millis((secs * 1000.0).round() as i64))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| INVALID_DATE.to_string())
}

pub fn claim_times(payload: &Map<String, Value>, now_seconds: i64) -> ClaimTimes {
    let formatted = |claim: &str| payload.get(claim).map(|v| format_timestamp(Some(v)));
    ClaimTimes {
        issued_at: formatted("iat"),
        not_before: formatted("nbf"),
        expires_at: formatted("exp"),
        expired: is_expired(payload, now_seconds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_base64_utf8;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn b64url(text: &str) -> String {
        encode_base64_utf8(text)
            .trim_end_matches('=')
            .replace('+', "-")
            .replace('/', "_")
    }

    fn token(header: &str, payload: &str) -> String {
        format!("{}.{}.sig-nature", b64url(header), b64url(payload))
    }

    #[test]
    fn parses_header_payload_and_keeps_signature_opaque() {
        let header = r#"{"alg":"HS256","typ":"JWT"}"#;
        let payload = r#"{"sub":"1234567890","name":"Jane ☃","iat":1516239022}"#;
        let decoded = parse_jwt(&token(header, payload)).unwrap();
        let expected: Value = serde_json::from_str(header).unwrap();
        assert_eq!(Value::Object(decoded.header.clone()), expected);
        assert_eq!(decoded.payload["name"], "Jane ☃");
        assert_eq!(decoded.signature, "sig-nature");
        assert_eq!(decoded.raw.header, b64url(header));
    }

    #[test]
    fn wrong_segment_count_is_format_error() {
        assert_eq!(parse_jwt("a.b").unwrap_err().kind(), ErrorKind::Format);
        assert_eq!(parse_jwt("a.b.c.d").unwrap_err().kind(), ErrorKind::Format);
        assert_eq!(parse_jwt("a..c").unwrap_err().kind(), ErrorKind::Format);
        assert_eq!(parse_jwt("   ").unwrap_err().kind(), ErrorKind::EmptyInput);
    }

    #[test]
    fn bad_segment_encoding_names_the_segment() {
        let err = parse_jwt("***.e30.sig").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
        assert!(err.to_string().contains("header"));

        let err = parse_jwt(&format!("e30.{}.sig", "_w")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
        assert!(err.to_string().contains("payload"));
    }

    #[test]
    fn non_object_or_broken_json_is_parse_error() {
        let err = parse_jwt(&token("[1,2]", "{}")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        let err = parse_jwt(&token("{}", r#"{"a":}"#)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.position(), Some(5));
    }

    #[test]
    fn deeply_nested_claims_decode() {
        let claim = format!("{}{}", "[".repeat(300), "]".repeat(300));
        let payload = format!(r#"{{"sub":"x","deep":{claim}}}"#);
        let decoded = parse_jwt(&token("{}", &payload)).unwrap();
        assert_eq!(decoded.payload["sub"], "x");
        assert!(decoded.payload["deep"].is_array());
    }

    #[test]
    fn expiry_compares_against_exp_claim() {
        let payload = json!({"exp": 1_000}).as_object().cloned().unwrap();
        assert!(!is_expired(&payload, 999));
        assert!(is_expired(&payload, 1_000));
        assert!(is_expired(&payload, 5_000));

        let missing = json!({"sub": "x"}).as_object().cloned().unwrap();
        assert!(!is_expired(&missing, i64::MAX));
        let textual = json!({"exp": "1000"}).as_object().cloned().unwrap();
        assert!(!is_expired(&textual, 5_000));
        assert!(!is_expired_now(&missing));
    }

    #[test]
    fn timestamps_format_as_utc_or_invalid_date() {
        assert_eq!(format_timestamp(Some(&json!(0))), "1970-01-01 00:00:00 UTC");
        assert_eq!(
            format_timestamp(Some(&json!(1_516_239_022))),
            "2018-01-18 01:30:22 UTC"
        );
        assert_eq!(format_timestamp(Some(&json!("soon"))), INVALID_DATE);
        assert_eq!(format_timestamp(Some(&json!(1e300))), INVALID_DATE);
        assert_eq!(format_timestamp(None), INVALID_DATE);
    }

    #[test]
    fn claim_times_cover_registered_claims() {
        let payload = json!({"iat": 0, "exp": 60}).as_object().cloned().unwrap();
        let times = claim_times(&payload, 120);
        assert_eq!(times.issued_at.as_deref(), Some("1970-01-01 00:00:00 UTC"));
        assert_eq!(times.expires_at.as_deref(), Some("1970-01-01 00:01:00 UTC"));
        assert_eq!(times.not_before, None);
        assert!(times.expired);
    }
}
