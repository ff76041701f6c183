//! Image preparation for vision requests.
//!
//! Photos arrive as whatever the chat platform stored. Before they go to the
//! model they are validated (decodable, known format) and, when needed,
//! downscaled and re-encoded to stay inside the API's dimension and size
//! limits.

use std::io::Cursor;

use {
    image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, imageops::FilterType},
    tracing::{debug, warn},
};

use crate::error::{Error, Result};

/// Longest side sent to the model. Larger images cost tokens without helping.
pub const DEFAULT_MAX_DIMENSION: u32 = 1568;

/// Upper bound for an inline image payload.
pub const MAX_FILE_SIZE_BYTES: usize = 5 * 1024 * 1024;

/// JPEG quality for re-encoded images (0-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Image metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

impl ImageMetadata {
    #[must_use]
    pub fn media_type(&self) -> &'static str {
        format_to_media_type(self.format)
    }
}

/// Result of image optimization.
#[derive(Debug)]
pub struct OptimizedImage {
    pub data: Vec<u8>,
    /// MIME type of `data`.
    pub media_type: String,
    pub original_width: u32,
    pub original_height: u32,
    pub final_width: u32,
    pub final_height: u32,
    pub was_resized: bool,
}

fn reader(data: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| Error::external("failed to guess image format", e))
}

/// Read format and dimensions without decoding the pixels.
pub fn get_image_metadata(data: &[u8]) -> Result<ImageMetadata> {
    if data.is_empty() {
        return Err(Error::invalid_input("image is empty"));
    }

    let reader = reader(data)?;
    let Some(format) = reader.format() else {
        return Err(Error::UnsupportedFormat {
            detected: "unknown".into(),
        });
    };
    if !format.reading_enabled() {
        return Err(Error::UnsupportedFormat {
            detected: format!("{format:?}").to_lowercase(),
        });
    }

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| Error::external("failed to read image dimensions", e))?;

    Ok(ImageMetadata {
        width,
        height,
        format,
    })
}

/// Downscale and re-encode `data` if it exceeds `max_dimension` or
/// [`MAX_FILE_SIZE_BYTES`]; otherwise return it untouched.
///
/// Images with an alpha channel stay PNG, everything else becomes JPEG.
pub fn optimize_for_llm(data: &[u8], max_dimension: Option<u32>) -> Result<OptimizedImage> {
    let max_dim = max_dimension.unwrap_or(DEFAULT_MAX_DIMENSION);
    let meta = get_image_metadata(data)?;

    let needs_resize =
        meta.width > max_dim || meta.height > max_dim || data.len() > MAX_FILE_SIZE_BYTES;
    if !needs_resize {
        return Ok(OptimizedImage {
            data: data.to_vec(),
            media_type: meta.media_type().to_string(),
            original_width: meta.width,
            original_height: meta.height,
            final_width: meta.width,
            final_height: meta.height,
            was_resized: false,
        });
    }

    let img = reader(data)?
        .decode()
        .map_err(|e| Error::external("failed to decode image", e))?;
    let resized = resize_to_fit(&img, max_dim);

    let (output, media_type) = if img.color().has_alpha() {
        (encode(&resized, ImageFormat::Png)?, "image/png")
    } else {
        (encode_jpeg_with_quality(&resized, DEFAULT_JPEG_QUALITY)?, "image/jpeg")
    };

    // Oversized output falls back to lossy JPEG, alpha or not.
    let (output, resized, media_type) = if output.len() > MAX_FILE_SIZE_BYTES {
        let (output, resized) = reduce_size_to_fit(&resized, MAX_FILE_SIZE_BYTES)?;
        (output, resized, "image/jpeg")
    } else {
        (output, resized, media_type)
    };

    let (final_width, final_height) = resized.dimensions();
    debug!(
        original_width = meta.width,
        original_height = meta.height,
        final_width,
        final_height,
        original_bytes = data.len(),
        final_bytes = output.len(),
        "optimized image"
    );

    Ok(OptimizedImage {
        data: output,
        media_type: media_type.to_string(),
        original_width: meta.width,
        original_height: meta.height,
        final_width,
        final_height,
        was_resized: true,
    })
}

/// Validate a downloaded photo and shrink it for a vision call.
///
/// Undecodable input is an error. If only the optimization step fails, the
/// original bytes are returned as-is.
pub fn prepare_for_vision(data: &[u8]) -> Result<OptimizedImage> {
    let meta = get_image_metadata(data)?;
    match optimize_for_llm(data, None) {
        Ok(optimized) => Ok(optimized),
        Err(e) => {
            warn!(error = %e, bytes = data.len(), "image optimization failed, sending original");
            Ok(OptimizedImage {
                data: data.to_vec(),
                media_type: meta.media_type().to_string(),
                original_width: meta.width,
                original_height: meta.height,
                final_width: meta.width,
                final_height: meta.height,
                was_resized: false,
            })
        },
    }
}

/// Resize so the longest side is at most `max_dimension`, keeping the aspect ratio.
fn resize_to_fit(img: &DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return img.clone();
    }
    // `resize` preserves the aspect ratio within the given bounds.
    img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut output = Cursor::new(Vec::new());
    img.write_to(&mut output, format)
        .map_err(|e| Error::external(format!("failed to encode as {format:?}"), e))?;
    Ok(output.into_inner())
}

fn encode_jpeg_with_quality(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut output = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
    // JPEG has no alpha channel.
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| Error::external("failed to encode as JPEG", e))?;
    Ok(output.into_inner())
}

/// Lower the JPEG quality, then the resolution, until the output fits.
fn reduce_size_to_fit(img: &DynamicImage, max_bytes: usize) -> Result<(Vec<u8>, DynamicImage)> {
    let mut last_len = 0;
    for quality in [80, 70, 60, 50, 40, 30] {
        let data = encode_jpeg_with_quality(img, quality)?;
        if data.len() <= max_bytes {
            return Ok((data, img.clone()));
        }
        last_len = data.len();
    }

    let (width, height) = img.dimensions();
    let smaller = (f64::from(width.max(height)) * 0.75).round() as u32;
    if smaller < 256 {
        return Err(Error::TooLarge {
            bytes: last_len,
            limit: max_bytes,
        });
    }

    let resized = img.resize(smaller, smaller, FilterType::Lanczos3);
    reduce_size_to_fit(&resized, max_bytes)
}

fn format_to_media_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Bmp => "image/bmp",
        _ => "image/jpeg",
    }
}
