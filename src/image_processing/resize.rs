use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::RgbImage;
use log::debug;
use std::num::NonZeroU32;

use super::codec::BitmapCodec;
use super::PreprocessError;

/// Encoder quality used for upload re-encoding
///
/// Always the maximum; the size reduction comes entirely from the resize.
pub const JPEG_QUALITY: u8 = 100;

/// Convolution filter used when resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleFilter {
    /// Averages whole source blocks, used for decode-time subsampling
    Box,
    /// High quality filter for the final upload resize
    Lanczos3,
}

impl ResampleFilter {
    fn algorithm(self) -> ResizeAlg {
        match self {
            ResampleFilter::Box => ResizeAlg::Convolution(FilterType::Box),
            ResampleFilter::Lanczos3 => ResizeAlg::Convolution(FilterType::Lanczos3),
        }
    }
}

/// Dimensions that fit `width`x`height` to `max_size` on the driving side
///
/// Landscape images (ratio > 1) get `max_size` as width, everything else
/// gets it as height. The other side follows the aspect ratio, rounded, and
/// never drops below one pixel.
pub fn get_resized_dimensions(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    let bitmap_ratio = width as f64 / height as f64;

    if bitmap_ratio > 1.0 {
        let new_height = (max_size as f64 / bitmap_ratio).round() as u32;
        (max_size, new_height.max(1))
    } else {
        let new_width = (max_size as f64 * bitmap_ratio).round() as u32;
        (new_width.max(1), max_size)
    }
}

/// Scale an upright image so its driving side equals `max_size`
pub fn get_resized_bitmap<C: BitmapCodec + ?Sized>(
    codec: &C,
    img: &RgbImage,
    max_size: u32,
) -> Result<RgbImage, PreprocessError> {
    if max_size == 0 {
        return Err(PreprocessError::Resize(
            "Maximum size must be greater than zero".to_string(),
        ));
    }

    let (width, height) = img.dimensions();
    let (new_width, new_height) = get_resized_dimensions(width, height, max_size);
    debug!(
        "Resizing {}x{} to {}x{} (max size {})",
        width, height, new_width, new_height, max_size
    );

    codec.resample(img, new_width, new_height)
}

/// Resize to `max_size` and encode as JPEG for upload
///
/// No rotation is applied here; the input is expected to be upright.
pub fn quality_reducer<C: BitmapCodec + ?Sized>(
    codec: &C,
    img: &RgbImage,
    max_size: u32,
) -> Result<Vec<u8>, PreprocessError> {
    let resized = get_resized_bitmap(codec, img, max_size)?;
    let bytes = codec.encode_jpeg(&resized, JPEG_QUALITY)?;
    debug!("Encoded {} bytes at quality {}", bytes.len(), JPEG_QUALITY);
    Ok(bytes)
}

/// Resize an image to exact dimensions with `fast_image_resize`
pub(crate) fn resize_image(
    img: &RgbImage,
    width: u32,
    height: u32,
    filter: ResampleFilter,
) -> Result<RgbImage, PreprocessError> {
    let (src_width, src_height) = img.dimensions();

    if src_width == width && src_height == height {
        return Ok(img.clone());
    }

    let src_width_nz = NonZeroU32::new(src_width)
        .ok_or_else(|| PreprocessError::Resize("Source width is zero".to_string()))?;
    let src_height_nz = NonZeroU32::new(src_height)
        .ok_or_else(|| PreprocessError::Resize("Source height is zero".to_string()))?;
    let dst_width_nz = NonZeroU32::new(width)
        .ok_or_else(|| PreprocessError::Resize("Target width is zero".to_string()))?;
    let dst_height_nz = NonZeroU32::new(height)
        .ok_or_else(|| PreprocessError::Resize("Target height is zero".to_string()))?;

    let src_image = Image::from_vec_u8(
        src_width_nz.get(),
        src_height_nz.get(),
        img.as_raw().clone(),
        PixelType::U8x3,
    )
    .map_err(|e| PreprocessError::Resize(format!("Invalid source buffer: {}", e)))?;

    let mut dst_image = Image::new(dst_width_nz.get(), dst_height_nz.get(), PixelType::U8x3);

    let mut resizer = Resizer::new();
    let options = ResizeOptions::new().resize_alg(filter.algorithm());
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| PreprocessError::Resize(format!("Resize failed: {}", e)))?;

    RgbImage::from_raw(width, height, dst_image.buffer().to_vec()).ok_or_else(|| {
        PreprocessError::Resize(format!(
            "Resized buffer does not match {}x{}",
            width, height
        ))
    })
}
