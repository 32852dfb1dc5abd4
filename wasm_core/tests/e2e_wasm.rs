#![cfg(target_arch = "wasm32")]

use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use js_sys::{Object, Reflect}; // Build JS option objects for the bindings.
use serde_json::Value as JsonValue;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

use devkit_wasm::{
    base64_decode, base64_encode, base64_is_valid, checksum_compare, checksum_compute,
    color_blindness_simulate, color_blindness_types, color_format, color_hex_to_rgb,
    color_is_valid_hex, color_rgb_to_hsl, color_shades, image_data_url_parse,
    json_analyze_indentation, json_format, json_validate, jwt_format_timestamp, jwt_is_expired,
    jwt_parse, lorem_generate, palette_extract, url_decode, url_encode, user_agent_parse,
    validate_image_upload,
};

wasm_bindgen_test_configure!(run_in_browser);

fn js_to_json(value: JsValue) -> JsonValue {
    serde_wasm_bindgen::from_value(value).expect("JsValue -> JSON")
}

fn ok_value(value: JsValue) -> JsonValue {
    let envelope = js_to_json(value);
    assert_eq!(envelope["ok"], true, "unexpected failure: {envelope}");
    envelope["value"].clone()
}

fn error_kind(value: JsValue) -> String {
    let envelope = js_to_json(value);
    assert_eq!(envelope["ok"], false, "unexpected success: {envelope}");
    envelope["error"].as_str().expect("error kind").to_string()
}

fn options(entries: &[(&str, JsValue)]) -> JsValue {
    let object = Object::new();
    for (key, value) in entries {
        Reflect::set(&object, &JsValue::from_str(key), value).expect("set option");
    }
    object.into()
}

fn png_bytes() -> Vec<u8> {
    let buffer = ImageBuffer::from_fn(8, 8, |x, y| {
        if x < 4 {
            Rgba([200u8, 30, 30, 255])
        } else {
            Rgba([20u8, 40, 180 + y as u8, 255])
        }
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(buffer)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

#[wasm_bindgen_test]
fn base64_round_trip_and_latin1_guard() {
    assert_eq!(ok_value(base64_encode("hello")), "aGVsbG8=");
    assert_eq!(ok_value(base64_decode("aGVsbG8")), "hello");
    assert_eq!(error_kind(base64_encode("€")), "EncodingError");
    assert_eq!(error_kind(base64_decode("***")), "DecodingError");
    assert!(base64_is_valid("eA=="));
    assert!(!base64_is_valid("not base64!"));
    assert!(!base64_is_valid(""));
}

#[wasm_bindgen_test]
fn url_component_codec() {
    assert_eq!(ok_value(url_encode("a b&c/é")), "a%20b%26c%2F%C3%A9");
    assert_eq!(ok_value(url_decode("a%20b%2Bc")), "a b+c");
    assert_eq!(error_kind(url_decode("%E0%A4%A")), "DecodingError");
    assert_eq!(error_kind(url_encode("")), "EmptyInputError");
}

#[wasm_bindgen_test]
fn json_format_reads_js_options() {
    let opts = options(&[
        ("indent", JsValue::from_f64(2.0)),
        ("sortKeys", JsValue::TRUE),
    ]);
    assert_eq!(
        ok_value(json_format(r#"{"b":1,"a":2}"#, opts)),
        "{\n  \"a\": 2,\n  \"b\": 1\n}"
    );
    let tabbed = ok_value(json_format(
        r#"{"a":[1]}"#,
        options(&[("indent", JsValue::from_str("tab"))]),
    ));
    assert_eq!(tabbed, "{\n\t\"a\": [\n\t\t1\n\t]\n}");
    assert_eq!(ok_value(json_format("[1,2]", JsValue::UNDEFINED)), "[\n  1,\n  2\n]");

    let envelope = js_to_json(json_validate(r#"{"a":}"#));
    assert_eq!(envelope["error"], "ParseError");
    assert_eq!(envelope["position"], 5);
    assert_eq!(ok_value(json_validate("{}")), true);

    let stats = js_to_json(json_analyze_indentation("{\n    \"a\": {\n        \"b\": 1\n    }\n}"));
    assert_eq!(stats["min"], 0);
    assert_eq!(stats["max"], 8);
}

#[wasm_bindgen_test]
fn jwt_parse_and_claims() {
    let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.\
                 eyJzdWIiOiIxMjM0NTY3ODkwIiwibmFtZSI6IkpvaG4gRG9lIiwiaWF0IjoxNTE2MjM5MDIyfQ.\
                 SflKxwRJSMeKKF2QT4fwpMeJf36POk6yJV_adQssw5c";
    let value = ok_value(jwt_parse(token));
    assert_eq!(value["header"]["alg"], "HS256");
    assert_eq!(value["payload"]["name"], "John Doe");
    assert_eq!(value["times"]["issuedAt"], "2018-01-18 01:30:22 UTC");
    assert_eq!(value["times"]["expired"], false);
    assert_eq!(error_kind(jwt_parse("a.b")), "FormatError");

    let expired = options(&[("exp", JsValue::from_f64(1.0))]);
    assert_eq!(ok_value(jwt_is_expired(expired)), true);
    assert_eq!(ok_value(jwt_is_expired(Object::new().into())), false);

    assert_eq!(
        jwt_format_timestamp(JsValue::from_f64(1516239022.0)),
        "2018-01-18 01:30:22 UTC"
    );
    assert_eq!(jwt_format_timestamp(JsValue::UNDEFINED), "Invalid Date");
}

#[wasm_bindgen_test]
async fn checksum_over_bytes() {
    let value = ok_value(checksum_compute(Vec::new(), "SHA-256".into(), None).await);
    assert_eq!(
        value["hash"],
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
    let value = ok_value(
        checksum_compute(
            b"abc".to_vec(),
            "md5".into(),
            Some("900150983CD24FB0D6963F7D28E17F72".into()),
        )
        .await,
    );
    assert_eq!(value["matches"], true);
    assert_eq!(
        error_kind(checksum_compute(Vec::new(), "whirlpool".into(), None).await),
        "UnsupportedAlgorithmError"
    );
    assert!(checksum_compare(" ABCDEF ", "abcdef"));
    assert!(!checksum_compare("abc", "abd"));
}

#[wasm_bindgen_test]
fn color_conversions() {
    let rgb = ok_value(color_hex_to_rgb("#1a365d"));
    assert_eq!(rgb, serde_json::json!({"r": 26, "g": 54, "b": 93}));
    let hsl = js_to_json(color_rgb_to_hsl(26, 54, 93));
    assert_eq!(hsl, serde_json::json!({"h": 215, "s": 56, "l": 23}));
    let shades = ok_value(color_shades("#ffffff", Some(6)));
    assert_eq!(shades.as_array().map(Vec::len), Some(6));
    assert_eq!(shades[5], "#000000");
    assert_eq!(ok_value(color_format("#1a365d", "rgb")), "rgb(26, 54, 93)");
    assert_eq!(ok_value(color_format("#zzz", "rgb")), "#zzz");
    assert_eq!(ok_value(color_format("#FFF", "hex")), "#FFF");
    assert_eq!(error_kind(color_shades("#fff", Some(u32::MAX))), "ValidationError");
    assert_eq!(error_kind(color_hex_to_rgb("#12")), "ValidationError");
    assert!(color_is_valid_hex("#abc"));
    assert!(!color_is_valid_hex("abc"));
}

#[wasm_bindgen_test]
async fn color_blindness_on_uploaded_png() {
    let types = js_to_json(color_blindness_types());
    assert_eq!(types.as_array().map(Vec::len), Some(7));
    assert_eq!(types[0]["id"], "protanopia");

    let value = ok_value(color_blindness_simulate(png_bytes(), "protanopia".into()).await);
    assert_eq!(value["width"], 8);
    assert!(value["dataUrl"].as_str().unwrap().starts_with("data:image/png;base64,"));
    assert_eq!(
        error_kind(color_blindness_simulate(png_bytes(), "sepia".into()).await),
        "ValidationError"
    );
}

#[wasm_bindgen_test]
fn lorem_from_js_options() {
    let opts = options(&[
        ("unit", JsValue::from_str("words")),
        ("count", JsValue::from_f64(5.0)),
        ("classicOpening", JsValue::TRUE),
    ]);
    assert_eq!(ok_value(lorem_generate(opts)), "lorem ipsum dolor sit amet");
    let text = ok_value(lorem_generate(JsValue::UNDEFINED));
    assert_eq!(text.as_str().unwrap().split("\n\n").count(), 3);
    let bad = options(&[("unit", JsValue::from_str("chapters"))]);
    assert_eq!(error_kind(lorem_generate(bad)), "ValidationError");
}

#[wasm_bindgen_test]
fn user_agent_fields_and_bots() {
    let info = js_to_json(user_agent_parse(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.7444.136 Safari/537.36",
    ));
    assert_eq!(info["browser"]["name"], "Chrome");
    assert_eq!(info["os"]["name"], "Windows");
    assert_eq!(info["isBot"], false);

    let bot = js_to_json(user_agent_parse(
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
    ));
    assert_eq!(bot["isBot"], true);
    assert_eq!(bot["isBotNaive"], true);
}

#[wasm_bindgen_test]
async fn palette_and_upload_checks() {
    let opts = options(&[
        ("count", JsValue::from_f64(3.0)),
        ("quality", JsValue::from_f64(1.0)),
    ]);
    let value = ok_value(palette_extract(png_bytes(), opts).await);
    assert_eq!(value["palette"].as_array().map(Vec::len), Some(3));
    assert!(value["dominant"].as_str().unwrap().starts_with('#'));

    let bad = options(&[("count", JsValue::from_f64(12.0))]);
    assert_eq!(error_kind(palette_extract(png_bytes(), bad).await), "ValidationError");

    assert_eq!(
        ok_value(validate_image_upload("image/png", 1024.0, JsValue::UNDEFINED)),
        true
    );
    assert_eq!(
        error_kind(validate_image_upload("image/gif", 10.0, JsValue::NULL)),
        "ValidationError"
    );

    let parsed = ok_value(image_data_url_parse("data:image/png;base64,iVBORw0KGgo="));
    assert_eq!(parsed["mime"], "image/png");
    assert_eq!(error_kind(image_data_url_parse("data:text/plain;base64,eA==")), "FormatError");
}
