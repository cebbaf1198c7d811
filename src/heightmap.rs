//! # Image to Heightmap
//!
//! Converts an uploaded picture into a grid of heights in `[0, 1]`, which the
//! [`crate::mesh`] module then turns into a printable relief.
//!
//! ## Pipeline
//!
//! ```text
//! bytes ──decode──▶ RGB ──downscale──▶ luma ──contrast──▶ blur ──invert──▶ Heightmap
//! ```
//!
//! - **Downscale**: the larger side is limited to `max_dim` pixels, preserving
//!   the aspect ratio. Images are never upscaled.
//! - **Contrast**: linear stretch around the image mean. `1.0` leaves the
//!   image untouched, values above `1.0` increase contrast.
//! - **Blur**: Gaussian blur with the given sigma, smoothing the relief.
//! - **Invert**: dark pixels become high instead of low.
//!
//! Bright pixels end up tall: a value of 255 maps to height `1.0`.

use image::{DynamicImage, GrayImage, imageops::FilterType};

use crate::error::HueforgeError;

/// Largest accepted `max_dim`. A 1024×1024 grid already yields about two
/// million triangles.
pub const MAX_GRID_DIM: u32 = 1024;

/// Parameters for [`image_to_heightmap`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightmapParams {
    /// Upper bound for the larger image side, in pixels.
    pub max_dim: u32,
    /// Contrast factor around the mean (1.0 = unchanged).
    pub contrast: f32,
    /// Gaussian blur sigma (0.0 = no blur).
    pub blur: f32,
    /// Invert brightness before converting to heights.
    pub invert: bool,
}

impl Default for HeightmapParams {
    fn default() -> Self {
        Self {
            max_dim: 300,
            contrast: 1.0,
            blur: 0.0,
            invert: false,
        }
    }
}

impl HeightmapParams {
    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<(), HueforgeError> {
        if self.max_dim == 0 {
            return Err(HueforgeError::InvalidParameter(
                "max_dim must be greater than zero".to_string(),
            ));
        }
        if self.max_dim > MAX_GRID_DIM {
            return Err(HueforgeError::InvalidParameter(format!(
                "max_dim must be at most {}, got {}",
                MAX_GRID_DIM, self.max_dim
            )));
        }
        if !self.contrast.is_finite() {
            return Err(HueforgeError::InvalidParameter(format!(
                "contrast must be finite, got {}",
                self.contrast
            )));
        }
        if !self.blur.is_finite() || self.blur < 0.0 {
            return Err(HueforgeError::InvalidParameter(format!(
                "blur must be a non-negative number, got {}",
                self.blur
            )));
        }
        Ok(())
    }
}

/// A row-major grid of heights in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightmap {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl Heightmap {
    /// Build a heightmap from raw row-major values.
    pub fn new(width: usize, height: usize, values: Vec<f32>) -> Result<Self, HueforgeError> {
        if values.len() != width * height {
            return Err(HueforgeError::Mesh(format!(
                "heightmap of {}x{} needs {} values, got {}",
                width,
                height,
                width * height,
                values.len()
            )));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Map each gray level `v` to `v / 255`.
    pub fn from_gray(gray: &GrayImage) -> Self {
        let values = gray.pixels().map(|p| p.0[0] as f32 / 255.0).collect();
        Self {
            width: gray.width() as usize,
            height: gray.height() as usize,
            values,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Height at `row`, `col`.
    ///
    /// Panics if the position is outside the grid.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.values[row * self.width + col]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Decode image bytes into an RGB image.
pub fn load_image(bytes: &[u8]) -> Result<DynamicImage, HueforgeError> {
    #[cfg(feature = "heif")]
    if is_heic(bytes) {
        return decode_heic(bytes).map(|img| DynamicImage::ImageRgb8(img.to_rgb8()));
    }

    let img = image::load_from_memory(bytes)
        .map_err(|e| HueforgeError::Image(format!("Failed to decode image: {}", e)))?;
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Run the grayscale pipeline and return the processed 8-bit image.
pub fn image_to_gray(img: &DynamicImage, params: &HeightmapParams) -> Result<GrayImage, HueforgeError> {
    params.validate()?;

    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(HueforgeError::Image("image has no pixels".to_string()));
    }

    let scale = (params.max_dim as f64 / width.max(height) as f64).min(1.0);
    let mut gray = if scale < 1.0 {
        let new_width = ((width as f64 * scale).round() as u32).max(1);
        let new_height = ((height as f64 * scale).round() as u32).max(1);
        img.resize_exact(new_width, new_height, FilterType::Lanczos3)
            .to_luma8()
    } else {
        img.to_luma8()
    };

    if params.contrast != 1.0 {
        apply_contrast(&mut gray, params.contrast);
    }

    if params.blur > 0.0 {
        gray = image::imageops::blur(&gray, params.blur);
    }

    if params.invert {
        image::imageops::invert(&mut gray);
    }

    Ok(gray)
}

/// Convert an image into a [`Heightmap`].
pub fn image_to_heightmap(
    img: &DynamicImage,
    params: &HeightmapParams,
) -> Result<Heightmap, HueforgeError> {
    let gray = image_to_gray(img, params)?;
    Ok(Heightmap::from_gray(&gray))
}

/// Linear contrast around the mean, clamped and truncated back to `u8`.
fn apply_contrast(gray: &mut GrayImage, contrast: f32) {
    let count = gray.pixels().count();
    if count == 0 {
        return;
    }
    let mean = gray.pixels().map(|p| p.0[0] as f64).sum::<f64>() / count as f64;
    let contrast = contrast as f64;

    for pixel in gray.pixels_mut() {
        let val = (pixel.0[0] as f64 - mean) * contrast + mean;
        pixel.0[0] = val.clamp(0.0, 255.0) as u8;
    }
}

/// Check if the data looks like a HEIC/HEIF file by examining magic bytes.
#[cfg(feature = "heif")]
fn is_heic(data: &[u8]) -> bool {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return false;
    }
    matches!(
        &data[8..12],
        b"heic" | b"heix" | b"hevc" | b"hevx" | b"heim" | b"heis" | b"hevm" | b"hevs" | b"mif1" | b"msf1"
    )
}

/// Decode a HEIC/HEIF image using libheif.
#[cfg(feature = "heif")]
fn decode_heic(data: &[u8]) -> Result<DynamicImage, HueforgeError> {
    use image::RgbImage;
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(data)
        .map_err(|e| HueforgeError::Image(format!("Failed to read HEIC: {}", e)))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| HueforgeError::Image(format!("Failed to get primary image: {}", e)))?;
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| HueforgeError::Image(format!("Failed to decode HEIC image: {}", e)))?;

    let planes = decoded.planes();
    let interleaved = planes
        .interleaved
        .ok_or_else(|| HueforgeError::Image("No interleaved RGB data in HEIC".to_string()))?;

    let (width, height) = (decoded.width(), decoded.height());
    let stride = interleaved.stride;
    let data = interleaved.data;

    let mut rgb = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let offset = (y as usize * stride) + (x as usize * 3);
            if offset + 2 < data.len() {
                rgb.put_pixel(
                    x,
                    y,
                    image::Rgb([data[offset], data[offset + 1], data[offset + 2]]),
                );
            }
        }
    }

    Ok(DynamicImage::ImageRgb8(rgb))
}
