//! Error taxonomy shared by every tool plus the tagged envelope handed to the
//! browser host.
//!
//! Module functions return `Result<T, ToolError>`; the wasm layer flattens that
//! into [`ToolResult`] so the UI can branch on `ok` before touching `value`.

use serde::Serialize;
use thiserror::Error;

/// Kind tag surfaced to JS as the `error` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "EmptyInputError")]
    EmptyInput,
    #[serde(rename = "ParseError")]
    Parse,
    #[serde(rename = "EncodingError")]
    Encoding,
    #[serde(rename = "DecodingError")]
    Decoding,
    #[serde(rename = "FormatError")]
    Format,
    #[serde(rename = "ValidationError")]
    Validation,
    #[serde(rename = "UnsupportedAlgorithmError")]
    UnsupportedAlgorithm,
    #[serde(rename = "ProcessingError")]
    Processing,
    #[serde(rename = "IOError")]
    Io,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    EmptyInput(String),
    /// Malformed structured text. `position` is a character offset into the
    /// text that failed to parse, when the parser reports one.
    #[error("{message}")]
    Parse {
        message: String,
        position: Option<usize>,
    },
    #[error("{0}")]
    Encoding(String),
    #[error("{0}")]
    Decoding(String),
    #[error("{0}")]
    Format(String),
    #[error("{0}")]
    Validation(String),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("{0}")]
    Processing(String),
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyInput(_) => ErrorKind::EmptyInput,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Encoding(_) => ErrorKind::Encoding,
            Self::Decoding(_) => ErrorKind::Decoding,
            Self::Format(_) => ErrorKind::Format,
            Self::Validation(_) => ErrorKind::Validation,
            Self::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            Self::Processing(_) => ErrorKind::Processing,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Parse { position, .. } => *position,
            _ => None,
        }
    }

    pub(crate) fn empty(what: &str) -> Self {
        Self::EmptyInput(format!("{what} is empty"))
    }
}

/// Tagged success/error union as seen by the UI:
/// `{ ok: true, value }` or `{ ok: false, error, detail, position? }`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl<T> From<Result<T, ToolError>> for ToolResult<T> {
    fn from(result: Result<T, ToolError>) -> Self {
        match result {
            Ok(value) => Self {
                ok: true,
                value: Some(value),
                error: None,
                detail: None,
                position: None,
            },
            Err(err) => Self {
                ok: false,
                value: None,
                error: Some(err.kind()),
                position: err.position(),
                detail: Some(err.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_carries_value_only() {
        let envelope = ToolResult::from(Ok::<_, ToolError>("eA==".to_string()));
        let json = serde_json::to_value(&envelope).expect("serialize envelope");
        assert_eq!(json, serde_json::json!({"ok": true, "value": "eA=="}));
    }

    #[test]
    fn error_envelope_reports_kind_detail_and_position() {
        let err = ToolError::Parse {
            message: "Invalid JSON: expected value at line 1 column 6".into(),
            position: Some(5),
        };
        let envelope = ToolResult::<()>::from(Err(err));
        let json = serde_json::to_value(&envelope).expect("serialize envelope");
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "ParseError");
        assert_eq!(json["position"], 5);
        assert!(json["detail"].as_str().unwrap().starts_with("Invalid JSON"));
        assert!(json.get("value").is_none());
    }

    #[test]
    fn io_errors_map_to_io_kind() {
        let err = ToolError::from(std::io::Error::other("handle closed"));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("handle closed"));
        let json = serde_json::to_value(ToolResult::<()>::from(Err(err))).unwrap();
        assert_eq!(json["error"], "IOError");
    }
}
