//! Format predicates used by the tool forms before any transformation runs.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::ToolError;

pub use crate::codec::is_valid_base64;

const MIB: u64 = 1024 * 1024;

static HEX_COLOR: OnceLock<Regex> = OnceLock::new();
static IMAGE_DATA_URL: OnceLock<Regex> = OnceLock::new();

fn hex_color_regex() -> &'static Regex {
    HEX_COLOR.get_or_init(|| {
        Regex::new(r"^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$").expect("hex color pattern compiles")
    })
}

fn image_data_url_regex() -> &'static Regex {
    IMAGE_DATA_URL.get_or_init(|| {
        Regex::new(r"^data:(image/(?:png|jpeg|webp|gif|svg\+xml));base64,")
            .expect("data url pattern compiles")
    })
}

/// Upload ceilings applied by the file-based tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadLimits {
    pub image_max_bytes: u64,
    pub checksum_max_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            image_max_bytes: 5 * MIB,
            checksum_max_bytes: 1024 * MIB,
        }
    }
}

/// `#rgb` or `#rrggbb`.
pub fn is_valid_hex_color(color: &str) -> bool {
    !color.trim().is_empty() && hex_color_regex().is_match(color)
}

/// Canonicalizes shorthand or long hex (with or without `#`) to lowercase `#rrggbb`.
/// This is the only shape the color module accepts.
pub fn normalize_hex_color(color: &str) -> Option<String> {
    let trimmed = color.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let expanded = match digits.len() {
        3 => digits.chars().flat_map(|ch| [ch, ch]).collect::<String>(),
        6 => digits.to_string(),
        _ => return None,
    };
    Some(format!("#{}", expanded.to_ascii_lowercase()))
}

pub fn is_valid_rgb(r: &str, g: &str, b: &str) -> bool {
    [r, g, b]
        .iter()
        .all(|channel| parse_int_prefix(channel).is_some_and(|n| (0..=255).contains(&n)))
}

pub fn is_valid_hsl(h: &str, s: &str, l: &str) -> bool {
    let percent = |value: &str| parse_int_prefix(value).is_some_and(|n| (0..=100).contains(&n));
    parse_int_prefix(h).is_some_and(|n| (0..=360).contains(&n)) && percent(s) && percent(l)
}

// Leading-integer parse in the spirit of JS `parseInt(value, 10)`: "12px" is 12, "px" is nothing.
fn parse_int_prefix(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Checks an image chosen for the palette, simulator or data-URL tools.
pub fn validate_image_upload(mime: &str, size: u64, max_size: u64) -> Result<(), ToolError> {
    let mime = mime.trim().to_ascii_lowercase();
    if !mime.starts_with("image/") {
        return Err(ToolError::Validation("File must be an image".into()));
    }
    validate_file_size(size, max_size)?;
    if !matches!(mime.as_str(), "image/jpeg" | "image/png" | "image/webp") {
        return Err(ToolError::Validation(
            "File must be a JPG, PNG, or WebP image".into(),
        ));
    }
    Ok(())
}

pub fn validate_file_size(size: u64, max_size: u64) -> Result<(), ToolError> {
    if size > max_size {
        return Err(ToolError::Validation(format!(
            "File size must be less than {}",
            human_size(max_size)
        )));
    }
    Ok(())
}

fn human_size(bytes: u64) -> String {
    if bytes >= 1024 * MIB && bytes % (1024 * MIB) == 0 {
        format!("{}GB", bytes / (1024 * MIB))
    } else if bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}

/// A `data:image/...;base64,` URL split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDataUrl {
    pub mime: String,
    pub base64: String,
}

pub fn parse_image_data_url(input: &str) -> Result<ImageDataUrl, ToolError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ToolError::empty("Base64 image data"));
    }
    let invalid = || {
        ToolError::Format(
            "Invalid Base64 image data URL. Please ensure it starts with 'data:image/' and contains valid Base64 data."
                .into(),
        )
    };
    let captures = image_data_url_regex().captures(trimmed).ok_or_else(invalid)?;
    let prefix_len = captures.get(0).map_or(0, |m| m.end());
    let payload = &trimmed[prefix_len..];
    if !codec::is_valid_base64(payload) {
        return Err(invalid());
    }
    Ok(ImageDataUrl {
        mime: captures[1].to_string(),
        base64: payload.to_string(),
    })
}
