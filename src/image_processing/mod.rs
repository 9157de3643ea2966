pub mod codec;
pub mod orientation;
pub mod resize;
pub mod sampling;
pub mod source;

use image::RgbImage;
use log::debug;

use codec::{BitmapCodec, ImageCodec};
use orientation::{rotate_image_if_required, ExifOrientationReader, OrientationReader};
use sampling::{calculate_in_sample_size, BoundingBox, ImageDimensions};
use source::StreamOpener;

/// Failure of a preprocessing step
///
/// Nothing is recovered locally; each step hands its error straight back.
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Resize error: {0}")]
    Resize(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

/// Loads an image upright and bounded for upload
///
/// Holds no mutable state; each call opens and releases its own streams
/// through the injected [`StreamOpener`].
#[derive(Debug, Clone)]
pub struct ImagePreprocessor<S, R = ExifOrientationReader, C = ImageCodec> {
    opener: S,
    orientation_reader: R,
    codec: C,
    bounds: BoundingBox,
}

impl<S: StreamOpener> ImagePreprocessor<S> {
    pub fn new(opener: S) -> Self {
        Self::with_collaborators(opener, ExifOrientationReader, ImageCodec)
    }
}

impl<S, R, C> ImagePreprocessor<S, R, C>
where
    S: StreamOpener,
    R: OrientationReader,
    C: BitmapCodec,
{
    pub fn with_collaborators(opener: S, orientation_reader: R, codec: C) -> Self {
        Self {
            opener,
            orientation_reader,
            codec,
            bounds: BoundingBox::default(),
        }
    }

    /// Replace the decode bounding box (1024x1024 by default)
    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Decode `source` downsampled to the bounding box and rotated upright
    pub fn handle_rotation(&self, source: &S::Key) -> Result<RgbImage, PreprocessError> {
        let dimensions = self.probe_dimensions(source)?;
        let in_sample_size = calculate_in_sample_size(dimensions, self.bounds);
        debug!(
            "Source is {}, sampling by {} to fit {}",
            dimensions, in_sample_size, self.bounds
        );

        let img = self.decode_sampled(source, in_sample_size)?;
        self.rotate_if_required(img, source)
    }

    /// Read only the header of `source`
    pub fn probe_dimensions(&self, source: &S::Key) -> Result<ImageDimensions, PreprocessError> {
        let mut stream = self.opener.open(source)?;
        self.codec.probe_dimensions(&mut stream)
    }

    /// Decode `source` from a fresh stream at the given sample size
    pub fn decode_sampled(
        &self,
        source: &S::Key,
        in_sample_size: u32,
    ) -> Result<RgbImage, PreprocessError> {
        let mut stream = self.opener.open(source)?;
        self.codec.decode(&mut stream, in_sample_size)
    }

    /// Reopen `source` for its orientation tag and rotate `img` to match
    pub fn rotate_if_required(
        &self,
        img: RgbImage,
        source: &S::Key,
    ) -> Result<RgbImage, PreprocessError> {
        let orientation = {
            let mut stream = self.opener.open(source)?;
            self.orientation_reader.read_orientation(&mut stream)?
        };
        debug!("EXIF orientation: {:?}", orientation);

        Ok(rotate_image_if_required(&self.codec, img, orientation))
    }

    /// Resize an upright image so its driving side is `max_size`
    pub fn get_resized_bitmap(
        &self,
        img: &RgbImage,
        max_size: u32,
    ) -> Result<RgbImage, PreprocessError> {
        resize::get_resized_bitmap(&self.codec, img, max_size)
    }

    /// Resize to `max_size` and JPEG-encode at [`resize::JPEG_QUALITY`]
    pub fn quality_reducer(&self, img: &RgbImage, max_size: u32) -> Result<Vec<u8>, PreprocessError> {
        resize::quality_reducer(&self.codec, img, max_size)
    }
}
