//! Image decoding and PNG data-URL encoding shared by the palette extractor and
//! the colour-blindness simulator.
//!
//! Everything is normalized to RGBA8 so callers can walk pixels in fixed
//! four-byte strides regardless of the source container.

pub mod palette;

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::io::AsyncRead;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, ImageReader};
use serde::Deserialize;
use tracing::debug;

use crate::error::ToolError;
use crate::source;

pub use palette::{Palette, extract_palette};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PictureFormat {
    Png,
    Jpeg,
    Webp,
    Gif,
}

impl PictureFormat {
    fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::WebP => Some(Self::Webp),
            ImageFormat::Gif => Some(Self::Gif),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPG",
            Self::Webp => "WebP",
            Self::Gif => "GIF",
        }
    }
}

/// RGBA8 pixels in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ToolError> {
        let buffer = Self {
            width,
            height,
            data,
        };
        buffer.check()?;
        Ok(buffer)
    }

    pub(crate) fn check(&self) -> Result<(), ToolError> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.data.len() != expected {
            return Err(ToolError::Processing(format!(
                "pixel buffer holds {} bytes, expected {expected} for {}x{} RGBA",
                self.data.len(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len() / 4
    }
}

/// Palette knobs exposed to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaletteOptions {
    /// Number of palette entries, 2-8.
    pub count: u8,
    /// Sample every n-th pixel; 1 is exhaustive.
    pub quality: u32,
}

impl Default for PaletteOptions {
    fn default() -> Self {
        Self {
            count: 4,
            quality: 10,
        }
    }
}

/// Decodes PNG, JPEG, WebP or GIF bytes (format sniffed from magic bytes) into RGBA8.
pub fn decode_pixels(bytes: &[u8]) -> Result<PixelBuffer, ToolError> {
    if bytes.is_empty() {
        return Err(ToolError::empty("input image"));
    }
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| ToolError::Processing(format!("failed to read image: {err}")))?;
    let format = reader
        .format()
        .and_then(PictureFormat::from_image_format)
        .ok_or_else(|| ToolError::Processing("Failed to load image: unsupported format".into()))?;
    let image = reader
        .decode()
        .map_err(|err| ToolError::Processing(format!("failed to decode {}: {err}", format.label())))?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    debug!(width, height, format = format.label(), "decoded image");
    Ok(PixelBuffer {
        width,
        height,
        data: rgba.into_raw(),
    })
}

pub fn encode_png_data_url(pixels: &PixelBuffer) -> Result<String, ToolError> {
    pixels.check()?;
    let mut buffer = Vec::new();
    PngEncoder::new(Cursor::new(&mut buffer))
        .write_image(
            &pixels.data,
            pixels.width,
            pixels.height,
            ExtendedColorType::Rgba8,
        )
        .map_err(|err| ToolError::Processing(format!("failed to encode PNG: {err}")))?;
    Ok(image_data_url("image/png", &buffer))
}

pub fn image_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Reads an uploaded image, decodes it and extracts its palette.
pub async fn extract_palette_from_source<R>(
    source: R,
    options: PaletteOptions,
) -> Result<Palette, ToolError>
where
    R: AsyncRead + Unpin,
{
    let bytes = source::read_all(source).await?;
    let pixels = decode_pixels(&bytes)?;
    palette::extract_palette_with_quality(&pixels, options.count, options.quality)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Cursor;

    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};

    /// Opaque gradient encoded as PNG.
    pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        encode(
            ImageBuffer::from_fn(width, height, |x, y| {
                Rgba([(x * 40 % 256) as u8, (y * 60 % 256) as u8, 128, 255])
            }),
            ImageFormat::Png,
        )
    }

    pub fn encode(buf: ImageBuffer<Rgba<u8>, Vec<u8>>, format: ImageFormat) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(buf);
        // JPEG has no alpha channel.
        let image = if format == ImageFormat::Jpeg {
            DynamicImage::ImageRgb8(image.to_rgb8())
        } else {
            image
        };
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), format)
            .expect("encode fixture");
        bytes
    }
}
