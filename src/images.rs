#![cfg(feature = "web")]
use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat};
use log::info;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::error::{AppError, AppResult};

/// Sub-directory of the storage root that holds roving photos
pub const ROVING_IMAGE_DIR: &str = "roving";
const JPEG_QUALITY: u8 = 80;

/// Make `input` safe to use as a file name
///
/// # Examples
/// ```
/// use roving_qc::images::sanitize;
///
/// assert_eq!(sanitize("3/7/2025 line 12"), "3_7_2025_line_12");
/// assert_eq!(sanitize(".."), "_");
/// ```
pub fn sanitize(input: &str) -> String {
    let sane: String = input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sane == "." || sane == ".." {
        "_".to_string()
    } else {
        sane
    }
}

/// Shrink an image to at most `max_width` pixels wide, keeping its aspect ratio
pub fn fit_width(img: DynamicImage, max_width: u32) -> DynamicImage {
    if max_width == 0 || img.width() <= max_width {
        return img;
    }
    let height = (img.height() as u64 * max_width as u64 / img.width() as u64).max(1) as u32;
    img.resize_exact(max_width, height, FilterType::Triangle)
}

/// Decode an uploaded photo, downscale it and store it as JPEG
///
/// Returns the public `/storage/...` path of the stored file.
pub fn store_inspection_image(
    bytes: &[u8],
    name_hint: &str,
    storage_dir: &Path,
    max_width: u32,
) -> AppResult<String> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| AppError::BadRequest(format!("Unsupported image: {}", e)))?;
    let img = DynamicImage::ImageRgb8(fit_width(img, max_width).to_rgb8());

    let mut encoded = Vec::new();
    img.write_to(&mut Cursor::new(&mut encoded), ImageOutputFormat::Jpeg(JPEG_QUALITY))
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let dir = storage_dir.join(ROVING_IMAGE_DIR);
    fs::create_dir_all(&dir)?;
    let file_name = format!(
        "{}-{}.jpg",
        sanitize(name_hint),
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    );
    fs::write(dir.join(&file_name), &encoded)?;
    info!(
        "stored roving image {} ({}x{}, {} bytes)",
        file_name,
        img.width(),
        img.height(),
        encoded.len()
    );

    Ok(format!("/storage/{}/{}", ROVING_IMAGE_DIR, file_name))
}
