//! JSON validation, pretty-printing and indentation analysis for the formatter tool.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ToolError;

/// Widest indent honoured, matching `JSON.stringify`.
pub const MAX_INDENT: u8 = 10;

// Nesting depth is unbounded; recursion grows the stack in chunks once less
// than the red zone remains.
const RED_ZONE: usize = 64 * 1024;
const STACK_CHUNK: usize = 1024 * 1024;
// `JSON.stringify` switches to exponent notation from here on.
const EXPONENT_THRESHOLD: f64 = 1e21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "IndentValue")]
pub enum IndentSpec {
    Spaces(u8),
    Tab,
}

impl Default for IndentSpec {
    fn default() -> Self {
        Self::Spaces(2)
    }
}

impl IndentSpec {
    fn unit(self) -> Vec<u8> {
        match self {
            Self::Spaces(width) => vec![b' '; usize::from(width.min(MAX_INDENT))],
            Self::Tab => vec![b'\t'],
        }
    }
}

impl FromStr for IndentSpec {
    type Err = ToolError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input == "\t" {
            return Ok(Self::Tab);
        }
        let normalized = input.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "t" | "tab" => Ok(Self::Tab),
            digits if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                let width = digits.parse::<u32>().unwrap_or(u32::MAX);
                Ok(Self::Spaces(width.min(u32::from(MAX_INDENT)) as u8))
            }
            other => Err(ToolError::Validation(format!(
                "unsupported indentation: {other:?}"
            ))),
        }
    }
}

impl fmt::Display for IndentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spaces(width) => write!(f, "{width}"),
            Self::Tab => f.write_str("t"),
        }
    }
}

// Options arrive from JS either as a number (`2`) or the select value (`"t"`).
#[derive(Deserialize)]
#[serde(untagged)]
enum IndentValue {
    Width(u8),
    Text(String),
}

impl TryFrom<IndentValue> for IndentSpec {
    type Error = ToolError;

    fn try_from(value: IndentValue) -> Result<Self, Self::Error> {
        match value {
            IndentValue::Width(width) => Ok(Self::Spaces(width.min(MAX_INDENT))),
            IndentValue::Text(text) => text.parse(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormatOptions {
    pub indent: IndentSpec,
    pub sort_keys: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndentationStats {
    pub min: usize,
    pub max: usize,
}

pub fn validate_json(input: &str) -> Result<(), ToolError> {
    parse(input).map(release)
}

/// Parses and re-serializes `input`. Integral numbers below 1e21 print without
/// a fraction and `-0` prints as `0`, as `JSON.stringify` does; larger
/// magnitudes keep serde_json's exponent form (`1e30`, not `1e+30`).
pub fn format_json(input: &str, options: FormatOptions) -> Result<String, ToolError> {
    let value = parse(input)?;
    let value = if options.sort_keys {
        sort_keys(value)
    } else {
        value
    };
    debug!(
        len = input.len(),
        indent = %options.indent,
        sort_keys = options.sort_keys,
        "format json"
    );
    let out = write_value(&value, options.indent);
    release(value);
    out
}

/// Recursively orders object keys by UTF-16 code units, the order
/// `Array.prototype.sort` gives. Arrays keep their element order.
pub fn sort_keys(value: Value) -> Value {
    stacker::maybe_grow(RED_ZONE, STACK_CHUNK, || match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| utf16_cmp(a, b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, inner)| (key, sort_keys(inner)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        leaf => leaf,
    })
}

fn utf16_cmp(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

/// Leading-whitespace extent over the non-blank lines of `text`.
pub fn analyze_indentation(text: &str) -> IndentationStats {
    let widths = text
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|ch| ch.is_whitespace()).count());
    let (min, max) = widths.fold((None, 0), |(min, max), width| {
        (Some(min.map_or(width, |m: usize| m.min(width))), max.max(width))
    });
    IndentationStats {
        min: min.unwrap_or(0),
        max,
    }
}

fn parse(input: &str) -> Result<Value, ToolError> {
    if input.trim().is_empty() {
        return Err(ToolError::empty("Input"));
    }
    parse_value(input).map_err(|err| parse_error("Invalid JSON", input, &err))
}

/// Full parse with no nesting limit, like `JSON.parse`.
pub(crate) fn parse_value(input: &str) -> Result<Value, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(input);
    de.disable_recursion_limit();
    let mut stacked = serde_stacker::Deserializer::new(&mut de);
    stacked.red_zone = RED_ZONE;
    stacked.stack_size = STACK_CHUNK;
    let value = Value::deserialize(stacked)?;
    de.end()?;
    Ok(value)
}

/// Drops `value` without recursing into its children.
pub(crate) fn release(value: Value) {
    let mut pending = vec![value];
    while let Some(value) = pending.pop() {
        match value {
            Value::Array(items) => pending.extend(items),
            Value::Object(map) => pending.extend(map.into_iter().map(|(_, inner)| inner)),
            _ => {}
        }
    }
}

// Serializes a `Value` one stack-checked level at a time.
struct Stacked<'a>(&'a Value);

impl Serialize for Stacked<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        stacker::maybe_grow(RED_ZONE, STACK_CHUNK, || match self.0 {
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Stacked(item))?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut entries = serializer.serialize_map(Some(map.len()))?;
                for (key, inner) in map {
                    entries.serialize_entry(key, &Stacked(inner))?;
                }
                entries.end()
            }
            Value::Number(number) => match number.as_f64() {
                Some(float)
                    if number.is_f64()
                        && float.fract() == 0.0
                        && float.abs() < EXPONENT_THRESHOLD =>
                {
                    serializer.serialize_i128(float as i128)
                }
                _ => number.serialize(serializer),
            },
            leaf => leaf.serialize(serializer),
        })
    }
}

fn write_value(value: &Value, indent: IndentSpec) -> Result<String, ToolError> {
    let unit = indent.unit();
    if unit.is_empty() {
        return serde_json::to_string(&Stacked(value))
            .map_err(|err| ToolError::Processing(err.to_string()));
    }
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&unit));
    Stacked(value)
        .serialize(&mut serializer)
        .map_err(|err| ToolError::Processing(err.to_string()))?;
    String::from_utf8(out).map_err(|err| ToolError::Processing(err.to_string()))
}

/// Builds a `ParseError` whose position is the character offset of the
/// parser's reported line/column within `input`.
pub(crate) fn parse_error(prefix: &str, input: &str, err: &serde_json::Error) -> ToolError {
    ToolError::Parse {
        message: format!("{prefix}: {err}"),
        position: char_offset(input, err.line(), err.column()),
    }
}

fn char_offset(input: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let line_start: usize = input
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    let mut byte = (line_start + column.saturating_sub(1)).min(input.len());
    while !input.is_char_boundary(byte) {
        byte -= 1;
    }
    Some(input[..byte].chars().count())
}
