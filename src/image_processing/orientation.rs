use exif::{In, Reader, Tag, Value};
use image::RgbImage;
use log::debug;
use std::io::{self, Cursor, Read};

use super::codec::BitmapCodec;

/// EXIF orientation values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExifOrientation {
    /// No orientation specified or undefined
    Undefined = 0,
    /// Normal orientation (0 degrees)
    TopLeft = 1,
    /// Horizontally flipped
    TopRight = 2,
    /// Rotated 180 degrees
    BottomRight = 3,
    /// Vertically flipped
    BottomLeft = 4,
    /// Rotated 90 degrees CCW + horizontally flipped
    LeftTop = 5,
    /// Rotated 90 degrees CW
    RightTop = 6,
    /// Rotated 90 degrees CW + horizontally flipped
    RightBottom = 7,
    /// Rotated 90 degrees CCW
    LeftBottom = 8,
}

impl From<u32> for ExifOrientation {
    fn from(value: u32) -> Self {
        match value {
            1 => ExifOrientation::TopLeft,
            2 => ExifOrientation::TopRight,
            3 => ExifOrientation::BottomRight,
            4 => ExifOrientation::BottomLeft,
            5 => ExifOrientation::LeftTop,
            6 => ExifOrientation::RightTop,
            7 => ExifOrientation::RightBottom,
            8 => ExifOrientation::LeftBottom,
            _ => ExifOrientation::Undefined,
        }
    }
}

/// Clockwise rotation needed to display an image upright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise90,
    Clockwise180,
    Clockwise270,
}

impl Rotation {
    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::Clockwise90 => 90,
            Rotation::Clockwise180 => 180,
            Rotation::Clockwise270 => 270,
        }
    }
}

impl ExifOrientation {
    /// Rotation that makes the image upright, if any
    ///
    /// Only the three pure rotations are corrected. Mirrored orientations
    /// (2, 4, 5, 7) are left alone and treated like Normal.
    pub fn correction(&self) -> Option<Rotation> {
        match self {
            ExifOrientation::RightTop => Some(Rotation::Clockwise90),
            ExifOrientation::BottomRight => Some(Rotation::Clockwise180),
            ExifOrientation::LeftBottom => Some(Rotation::Clockwise270),
            _ => None,
        }
    }
}

/// Reads the orientation tag from an image stream
pub trait OrientationReader {
    /// Missing or unreadable metadata yields `ExifOrientation::Undefined`;
    /// only failures of the stream itself are errors.
    fn read_orientation(&self, stream: &mut dyn Read) -> io::Result<ExifOrientation>;
}

/// Orientation reader backed by `kamadak-exif`
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifOrientationReader;

impl OrientationReader for ExifOrientationReader {
    fn read_orientation(&self, stream: &mut dyn Read) -> io::Result<ExifOrientation> {
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        Ok(read_exif_orientation(&bytes))
    }
}

/// Read the EXIF orientation tag from an in-memory image container
pub fn read_exif_orientation(bytes: &[u8]) -> ExifOrientation {
    let exif = match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(e) => {
            debug!("No usable EXIF data: {}", e);
            return ExifOrientation::Undefined;
        }
    };

    if let Some(field) = exif.get_field(Tag::Orientation, In::PRIMARY) {
        if let Value::Short(values) = &field.value {
            if let Some(&orientation_value) = values.first() {
                return ExifOrientation::from(orientation_value as u32);
            }
        }
    }

    ExifOrientation::Undefined
}

/// Rotate a decoded image upright according to its EXIF orientation
///
/// Returns the same buffer untouched when no rotation applies.
pub fn rotate_image_if_required<C: BitmapCodec + ?Sized>(
    codec: &C,
    img: RgbImage,
    orientation: ExifOrientation,
) -> RgbImage {
    match orientation.correction() {
        Some(rotation) => {
            debug!("Applying {}° rotation for {:?}", rotation.degrees(), orientation);
            codec.rotate(&img, rotation)
        }
        None => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::codec::ImageCodec;
    use crate::test_support::jpeg_with_orientation;
    use image::{ImageBuffer, ImageFormat, Rgb};

    fn create_test_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 7]))
    }

    #[test]
    fn test_exif_orientation_from_u32() {
        assert_eq!(ExifOrientation::from(1), ExifOrientation::TopLeft);
        assert_eq!(ExifOrientation::from(3), ExifOrientation::BottomRight);
        assert_eq!(ExifOrientation::from(6), ExifOrientation::RightTop);
        assert_eq!(ExifOrientation::from(8), ExifOrientation::LeftBottom);
        assert_eq!(ExifOrientation::from(99), ExifOrientation::Undefined);
    }

    #[test]
    fn test_only_pure_rotations_are_corrected() {
        assert_eq!(ExifOrientation::RightTop.correction(), Some(Rotation::Clockwise90));
        assert_eq!(ExifOrientation::BottomRight.correction(), Some(Rotation::Clockwise180));
        assert_eq!(ExifOrientation::LeftBottom.correction(), Some(Rotation::Clockwise270));

        for ignored in [
            ExifOrientation::Undefined,
            ExifOrientation::TopLeft,
            ExifOrientation::TopRight,
            ExifOrientation::BottomLeft,
            ExifOrientation::LeftTop,
            ExifOrientation::RightBottom,
        ] {
            assert_eq!(ignored.correction(), None, "{:?}", ignored);
        }
    }

    #[test]
    fn test_read_orientation_from_jpeg() {
        let img = create_test_image(8, 4);
        for (tag, expected) in [
            (1, ExifOrientation::TopLeft),
            (3, ExifOrientation::BottomRight),
            (6, ExifOrientation::RightTop),
            (8, ExifOrientation::LeftBottom),
        ] {
            let bytes = jpeg_with_orientation(&img, tag).unwrap();
            let orientation = ExifOrientationReader
                .read_orientation(&mut Cursor::new(bytes))
                .unwrap();
            assert_eq!(orientation, expected);
        }
    }

    #[test]
    fn test_missing_exif_is_undefined() {
        let mut png = Cursor::new(Vec::new());
        create_test_image(4, 4)
            .write_to(&mut png, ImageFormat::Png)
            .unwrap();
        assert_eq!(read_exif_orientation(png.get_ref()), ExifOrientation::Undefined);
        assert_eq!(read_exif_orientation(b"garbage"), ExifOrientation::Undefined);
    }

    #[test]
    fn test_normal_orientation_is_identity() {
        let img = create_test_image(6, 3);
        let result = rotate_image_if_required(&ImageCodec, img.clone(), ExifOrientation::TopLeft);
        assert_eq!(result, img);
    }

    #[test]
    fn test_flipped_orientation_is_ignored() {
        let img = create_test_image(6, 3);
        let result = rotate_image_if_required(&ImageCodec, img.clone(), ExifOrientation::TopRight);
        assert_eq!(result, img);
    }

    #[test]
    fn test_rotate_90_clockwise() {
        let img = create_test_image(6, 3);
        let result = rotate_image_if_required(&ImageCodec, img.clone(), ExifOrientation::RightTop);

        assert_eq!(result.dimensions(), (3, 6));
        // Clockwise: the source top-left corner lands in the top-right
        assert_eq!(result.get_pixel(2, 0), img.get_pixel(0, 0));
        assert_eq!(result.get_pixel(0, 5), img.get_pixel(5, 2));
    }

    #[test]
    fn test_rotate_180_and_270() {
        let img = create_test_image(6, 3);

        let half = rotate_image_if_required(&ImageCodec, img.clone(), ExifOrientation::BottomRight);
        assert_eq!(half.dimensions(), (6, 3));
        assert_eq!(half.get_pixel(5, 2), img.get_pixel(0, 0));

        let three_quarter =
            rotate_image_if_required(&ImageCodec, img.clone(), ExifOrientation::LeftBottom);
        assert_eq!(three_quarter.dimensions(), (3, 6));
        // Counter-clockwise: the source top-left corner lands in the bottom-left
        assert_eq!(three_quarter.get_pixel(0, 5), img.get_pixel(0, 0));
    }
}
