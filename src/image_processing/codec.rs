use image::codecs::jpeg::JpegEncoder;
use image::{imageops, ExtendedColorType, ImageFormat, ImageReader, RgbImage};
use jpeg_decoder::PixelFormat;
use log::debug;
use std::io::{self, BufRead, BufReader, Cursor, Read};

use super::orientation::Rotation;
use super::resize::{resize_image, ResampleFilter};
use super::sampling::{sampled_dimensions, ImageDimensions};
use super::PreprocessError;

/// Platform bitmap operations the preprocessor depends on
pub trait BitmapCodec {
    /// Read width and height from the image header
    fn probe_dimensions(&self, stream: &mut dyn Read) -> Result<ImageDimensions, PreprocessError>;

    /// Decode the image, dividing each dimension by `in_sample_size`
    fn decode(&self, stream: &mut dyn Read, in_sample_size: u32)
        -> Result<RgbImage, PreprocessError>;

    /// Rotate clockwise, returning a new buffer
    fn rotate(&self, image: &RgbImage, rotation: Rotation) -> RgbImage;

    /// Smooth (non nearest-neighbour) resample to exact dimensions
    fn resample(&self, image: &RgbImage, width: u32, height: u32)
        -> Result<RgbImage, PreprocessError>;

    /// Lossy JPEG encode at `quality` (1-100)
    fn encode_jpeg(&self, image: &RgbImage, quality: u8) -> Result<Vec<u8>, PreprocessError>;
}

/// Default codec backed by the `image`, `jpeg-decoder` and `fast_image_resize` crates
///
/// JPEG input is probed from its frame header alone and, when sampled,
/// decoded with DCT scaling so the full-size bitmap is never materialized.
/// Other formats are buffered and decoded by `image`, then box-filtered.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl ImageCodec {
    fn reader(bytes: Vec<u8>) -> Result<ImageReader<Cursor<Vec<u8>>>, PreprocessError> {
        // The stream is not seekable, so buffer it before format detection
        Ok(ImageReader::new(Cursor::new(bytes)).with_guessed_format()?)
    }
}

fn read_all(stream: &mut dyn Read) -> Result<Vec<u8>, PreprocessError> {
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Peek at the buffered head of `reader` without consuming it
fn sniff_format(reader: &mut impl BufRead) -> io::Result<Option<ImageFormat>> {
    let head = reader.fill_buf()?;
    Ok(image::guess_format(head).ok())
}

fn jpeg_error(e: jpeg_decoder::Error) -> PreprocessError {
    match e {
        jpeg_decoder::Error::Io(e) if e.kind() != io::ErrorKind::UnexpectedEof => {
            PreprocessError::Io(e)
        }
        other => PreprocessError::Decode(format!("Failed to decode JPEG: {}", other)),
    }
}

/// Result of a DCT-scaled JPEG decode
#[derive(Debug)]
pub(crate) struct ScaledJpeg {
    /// Size the JPEG decoder produced before the final box filter
    pub(crate) decoded: ImageDimensions,
    pub(crate) image: RgbImage,
}

/// Decode a JPEG at the nearest 1/8, 1/4, 1/2 or full scale covering
/// `dimension / in_sample_size`, then box-filter the remainder
///
/// Returns `None` for 16-bit JPEGs, which the caller decodes the generic way.
pub(crate) fn decode_jpeg_scaled(
    bytes: &[u8],
    in_sample_size: u32,
) -> Result<Option<ScaledJpeg>, PreprocessError> {
    let mut decoder = jpeg_decoder::Decoder::new(bytes);
    decoder.read_info().map_err(jpeg_error)?;
    let info = decoder
        .info()
        .ok_or_else(|| PreprocessError::Decode("JPEG has no frame header".to_string()))?;

    if matches!(info.pixel_format, PixelFormat::L16) {
        return Ok(None);
    }

    let source = ImageDimensions::new(info.width as u32, info.height as u32);
    let target = sampled_dimensions(source, in_sample_size);

    // Smallest supported scale whose output still covers the target
    let (width, height) = decoder
        .scale(target.width as u16, target.height as u16)
        .map_err(jpeg_error)?;
    let pixels = decoder.decode().map_err(jpeg_error)?;

    let rgb = match info.pixel_format {
        PixelFormat::RGB24 => pixels,
        PixelFormat::L8 => pixels.iter().flat_map(|&l| [l, l, l]).collect(),
        PixelFormat::CMYK32 => cmyk_to_rgb(&pixels),
        _ => return Ok(None),
    };

    let decoded = ImageDimensions::new(width as u32, height as u32);
    let scaled = RgbImage::from_raw(decoded.width, decoded.height, rgb).ok_or_else(|| {
        PreprocessError::Decode(format!("JPEG pixel data does not match {}", decoded))
    })?;
    debug!(
        "DCT-scaled JPEG {} to {} (target {})",
        source, decoded, target
    );

    let image = if decoded == target {
        scaled
    } else {
        resize_image(&scaled, target.width, target.height, ResampleFilter::Box)?
    };

    Ok(Some(ScaledJpeg { decoded, image }))
}

/// Adobe-inverted CMYK from the JPEG decoder to RGB
fn cmyk_to_rgb(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len() / 4 * 3);
    for pixel in input.chunks_exact(4) {
        let c = pixel[0] as f32 / 255.0;
        let m = pixel[1] as f32 / 255.0;
        let y = pixel[2] as f32 / 255.0;
        let k = pixel[3] as f32 / 255.0;

        // CMYK -> CMY
        let c = c * (1.0 - k) + k;
        let m = m * (1.0 - k) + k;
        let y = y * (1.0 - k) + k;

        // CMY -> RGB
        output.push(((1.0 - c) * 255.0) as u8);
        output.push(((1.0 - m) * 255.0) as u8);
        output.push(((1.0 - y) * 255.0) as u8);
    }
    output
}

impl BitmapCodec for ImageCodec {
    fn probe_dimensions(&self, stream: &mut dyn Read) -> Result<ImageDimensions, PreprocessError> {
        let mut reader = BufReader::new(stream);

        let (width, height) = if sniff_format(&mut reader)? == Some(ImageFormat::Jpeg) {
            // Reads up to the frame header only
            let mut decoder = jpeg_decoder::Decoder::new(&mut reader);
            decoder.read_info().map_err(jpeg_error)?;
            let info = decoder
                .info()
                .ok_or_else(|| PreprocessError::Decode("JPEG has no frame header".to_string()))?;
            (info.width as u32, info.height as u32)
        } else {
            let bytes = read_all(&mut reader)?;
            Self::reader(bytes)?.into_dimensions().map_err(|e| {
                PreprocessError::Decode(format!("Failed to read image header: {}", e))
            })?
        };

        if width == 0 || height == 0 {
            return Err(PreprocessError::Decode(format!(
                "Image reports empty dimensions {}x{}",
                width, height
            )));
        }

        Ok(ImageDimensions::new(width, height))
    }

    fn decode(
        &self,
        stream: &mut dyn Read,
        in_sample_size: u32,
    ) -> Result<RgbImage, PreprocessError> {
        let bytes = read_all(stream)?;

        if in_sample_size > 1 && image::guess_format(&bytes).ok() == Some(ImageFormat::Jpeg) {
            if let Some(scaled) = decode_jpeg_scaled(&bytes, in_sample_size)? {
                return Ok(scaled.image);
            }
        }

        let decoded = Self::reader(bytes)?
            .decode()
            .map_err(|e| PreprocessError::Decode(format!("Failed to decode image: {}", e)))?
            .to_rgb8();

        if in_sample_size <= 1 {
            return Ok(decoded);
        }

        let (width, height) = decoded.dimensions();
        let target = sampled_dimensions(ImageDimensions::new(width, height), in_sample_size);
        debug!(
            "Subsampling {}x{} by {} to {}",
            width, height, in_sample_size, target
        );

        // A box filter averages each factor x factor block like codec-level subsampling
        resize_image(&decoded, target.width, target.height, ResampleFilter::Box)
    }

    fn rotate(&self, image: &RgbImage, rotation: Rotation) -> RgbImage {
        match rotation {
            Rotation::Clockwise90 => imageops::rotate90(image),
            Rotation::Clockwise180 => imageops::rotate180(image),
            Rotation::Clockwise270 => imageops::rotate270(image),
        }
    }

    fn resample(
        &self,
        image: &RgbImage,
        width: u32,
        height: u32,
    ) -> Result<RgbImage, PreprocessError> {
        resize_image(image, width, height, ResampleFilter::Lanczos3)
    }

    fn encode_jpeg(&self, image: &RgbImage, quality: u8) -> Result<Vec<u8>, PreprocessError> {
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| PreprocessError::Encode(format!("Failed to encode JPEG: {}", e)))?;
        Ok(buf)
    }
}
