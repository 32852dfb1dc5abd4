use chrono::Utc;
use console_error_panic_hook::set_once as set_panic_hook;
use futures::io::Cursor;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use serde_wasm_bindgen::Serializer;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;

pub mod checksum;
pub mod codec;
pub mod color;
pub mod error;
pub mod images;
pub mod json;
pub mod jwt;
pub mod lorem;
pub mod source;
pub mod user_agent;
pub mod validation;


use checksum::ChecksumAlgorithm;
use color::blindness::{SimulatedImage, SimulationType};
use color::{ColorFormat, Rgb};
use error::{ToolError, ToolResult};
use images::{Palette, PaletteOptions};
use json::FormatOptions;
use jwt::{ClaimTimes, DecodedJwt};
use lorem::LoremOptions;
use validation::UploadLimits;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    set_panic_hook();
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> JsValue {
    value
        .serialize(&Serializer::json_compatible())
        .unwrap_or_else(|err| JsValue::from_str(&err.to_string()))
}

fn envelope<T: Serialize>(operation: &str, result: Result<T, ToolError>) -> JsValue {
    if let Err(err) = &result {
        warn!(operation, kind = ?err.kind(), "{err}");
    }
    to_js(&ToolResult::from(result))
}

/// `undefined` and `null` mean "all defaults".
fn options_from_js<T>(value: JsValue) -> Result<T, ToolError>
where
    T: DeserializeOwned + Default,
{
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    serde_wasm_bindgen::from_value(value)
        .map_err(|err| ToolError::Validation(format!("invalid options: {err}")))
}

#[wasm_bindgen]
pub fn base64_encode(input: &str) -> JsValue {
    envelope("base64_encode", codec::encode_base64(input))
}

#[wasm_bindgen]
pub fn base64_decode(input: &str) -> JsValue {
    envelope("base64_decode", codec::decode_base64(input))
}

#[wasm_bindgen]
pub fn base64_is_valid(input: &str) -> bool {
    validation::is_valid_base64(input)
}

#[wasm_bindgen]
pub fn url_encode(input: &str) -> JsValue {
    envelope("url_encode", codec::encode_url(input))
}

#[wasm_bindgen]
pub fn url_decode(input: &str) -> JsValue {
    envelope("url_decode", codec::decode_url(input))
}

#[wasm_bindgen]
pub fn json_validate(input: &str) -> JsValue {
    envelope("json_validate", json::validate_json(input).map(|()| true))
}

#[wasm_bindgen]
pub fn json_format(input: &str, options: JsValue) -> JsValue {
    let result = options_from_js::<FormatOptions>(options)
        .and_then(|options| json::format_json(input, options));
    envelope("json_format", result)
}

#[wasm_bindgen]
pub fn json_analyze_indentation(input: &str) -> JsValue {
    to_js(&json::analyze_indentation(input))
}

/// Decoded token plus its registered time claims evaluated at `now_seconds`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JwtView {
    #[serde(flatten)]
    token: DecodedJwt,
    times: ClaimTimes,
}

fn jwt_parse_internal(token: &str, now_seconds: i64) -> Result<JwtView, ToolError> {
    let token = jwt::parse_jwt(token)?;
    let times = jwt::claim_times(&token.payload, now_seconds);
    Ok(JwtView { token, times })
}

#[wasm_bindgen]
pub fn jwt_parse(token: &str) -> JsValue {
    envelope("jwt_parse", jwt_parse_internal(token, Utc::now().timestamp()))
}

/// `payload` is the decoded claims object.
#[wasm_bindgen]
pub fn jwt_is_expired(payload: JsValue) -> JsValue {
    let result = serde_wasm_bindgen::from_value::<Map<String, Value>>(payload)
        .map_err(|err| ToolError::Validation(format!("payload must be an object: {err}")))
        .map(|claims| jwt::is_expired_now(&claims));
    envelope("jwt_is_expired", result)
}

#[wasm_bindgen]
pub fn jwt_format_timestamp(value: JsValue) -> String {
    let value = serde_wasm_bindgen::from_value::<Option<Value>>(value)
        .ok()
        .flatten();
    jwt::format_timestamp(value.as_ref())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChecksumReport {
    algorithm: ChecksumAlgorithm,
    hash: String,
    /// Present only when an expected digest was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    matches: Option<bool>,
}

async fn checksum_compute_internal(
    bytes: Vec<u8>,
    algorithm: &str,
    expected: Option<&str>,
    limits: UploadLimits,
) -> Result<ChecksumReport, ToolError> {
    let algorithm: ChecksumAlgorithm = algorithm.parse()?;
    validation::validate_file_size(bytes.len() as u64, limits.checksum_max_bytes)?;
    let hash = checksum::compute_checksum(Cursor::new(bytes), algorithm).await?;
    let matches = expected.and_then(|expected| checksum::compare_to_expected(&hash, expected));
    Ok(ChecksumReport {
        algorithm,
        hash,
        matches,
    })
}

#[wasm_bindgen]
pub async fn checksum_compute(bytes: Vec<u8>, algorithm: String, expected: Option<String>) -> JsValue {
    let result = checksum_compute_internal(
        bytes,
        &algorithm,
        expected.as_deref(),
        UploadLimits::default(),
    )
    .await;
    envelope("checksum_compute", result)
}

#[wasm_bindgen]
pub fn checksum_compare(a: &str, b: &str) -> bool {
    checksum::compare_hashes(a, b)
}

fn canonical_hex(input: &str) -> Result<String, ToolError> {
    validation::normalize_hex_color(input)
        .ok_or_else(|| ToolError::Validation(format!("Invalid hex color: {}", input.trim())))
}

fn color_hex_to_rgb_internal(input: &str) -> Result<Rgb, ToolError> {
    let hex = canonical_hex(input)?;
    color::hex_to_rgb(&hex)
        .ok_or_else(|| ToolError::Validation(format!("Invalid hex color: {}", input.trim())))
}

fn color_shades_internal(input: &str, steps: Option<u32>) -> Result<Vec<String>, ToolError> {
    let hex = canonical_hex(input)?;
    let steps = steps.map_or(color::DEFAULT_SHADE_STEPS, |steps| steps as usize);
    if steps > color::MAX_SHADE_STEPS {
        return Err(ToolError::Validation(format!(
            "steps must be at most {}",
            color::MAX_SHADE_STEPS
        )));
    }
    Ok(color::generate_shades(&hex, steps))
}

/// Never fails on the colour itself: unparsable input and `hex` output echo
/// `input` unchanged. Only an unknown format name is rejected.
fn color_format_internal(input: &str, format: &str) -> Result<String, ToolError> {
    let format: ColorFormat = format.parse()?;
    Ok(match validation::normalize_hex_color(input) {
        Some(hex) if format != ColorFormat::Hex => color::format_color(&hex, format),
        _ => input.to_string(),
    })
}

#[wasm_bindgen]
pub fn color_hex_to_rgb(hex: &str) -> JsValue {
    envelope("color_hex_to_rgb", color_hex_to_rgb_internal(hex))
}

#[wasm_bindgen]
pub fn color_rgb_to_hsl(r: u8, g: u8, b: u8) -> JsValue {
    to_js(&color::rgb_to_hsl(r, g, b))
}

#[wasm_bindgen]
pub fn color_shades(hex: &str, steps: Option<u32>) -> JsValue {
    envelope("color_shades", color_shades_internal(hex, steps))
}

#[wasm_bindgen]
pub fn color_format(hex: &str, format: &str) -> JsValue {
    envelope("color_format", color_format_internal(hex, format))
}

#[wasm_bindgen]
pub fn color_is_valid_hex(input: &str) -> bool {
    validation::is_valid_hex_color(input)
}

async fn color_blindness_internal(
    bytes: Vec<u8>,
    kind: &str,
    limits: UploadLimits,
) -> Result<SimulatedImage, ToolError> {
    let kind: SimulationType = kind.parse()?;
    validation::validate_file_size(bytes.len() as u64, limits.image_max_bytes)?;
    color::blindness::simulate_image(Cursor::new(bytes), kind).await
}

#[wasm_bindgen]
pub async fn color_blindness_simulate(bytes: Vec<u8>, kind: String) -> JsValue {
    let result = color_blindness_internal(bytes, &kind, UploadLimits::default()).await;
    envelope("color_blindness_simulate", result)
}

#[wasm_bindgen]
pub fn color_blindness_types() -> JsValue {
    to_js(&color::blindness::simulation_types())
}

#[wasm_bindgen]
pub fn lorem_generate(options: JsValue) -> JsValue {
    let result = options_from_js::<LoremOptions>(options).and_then(lorem::generate);
    envelope("lorem_generate", result)
}

#[wasm_bindgen]
pub fn user_agent_parse(ua: &str) -> JsValue {
    to_js(&user_agent::parse(ua))
}

async fn palette_internal(
    bytes: Vec<u8>,
    options: PaletteOptions,
    limits: UploadLimits,
) -> Result<Palette, ToolError> {
    validation::validate_file_size(bytes.len() as u64, limits.image_max_bytes)?;
    images::extract_palette_from_source(Cursor::new(bytes), options).await
}

#[wasm_bindgen]
pub async fn palette_extract(bytes: Vec<u8>, options: JsValue) -> JsValue {
    let result = match options_from_js::<PaletteOptions>(options) {
        Ok(options) => palette_internal(bytes, options, UploadLimits::default()).await,
        Err(err) => Err(err),
    };
    envelope("palette_extract", result)
}

#[wasm_bindgen]
pub fn image_data_url_parse(input: &str) -> JsValue {
    envelope(
        "image_data_url_parse",
        validation::parse_image_data_url(input),
    )
}

fn upload_internal(mime: &str, size: f64, limits: UploadLimits) -> Result<(), ToolError> {
    if !size.is_finite() || size < 0.0 {
        return Err(ToolError::Validation(format!("Invalid file size: {size}")));
    }
    debug!(mime, size, "validate upload");
    validation::validate_image_upload(mime, size as u64, limits.image_max_bytes)
}

/// `size` is the byte count reported by the browser `File` object.
#[wasm_bindgen]
pub fn validate_image_upload(mime: &str, size: f64, limits: JsValue) -> JsValue {
    let result = options_from_js::<UploadLimits>(limits)
        .and_then(|limits| upload_internal(mime, size, limits))
        .map(|()| true);
    envelope("validate_image_upload", result)
}
