// Library exports for reuse by the CLI and host applications
pub mod batch;
pub mod cli;
pub mod config_file;
pub mod image_processing;
#[doc(hidden)]
pub mod test_support;
pub mod utils;

// Re-export commonly used types
pub use batch::{ProcessingConfig, ProcessingEngine, ProcessingResult};
pub use image_processing::codec::{BitmapCodec, ImageCodec};
pub use image_processing::orientation::{
    ExifOrientation, ExifOrientationReader, OrientationReader, Rotation,
};
pub use image_processing::resize::JPEG_QUALITY;
pub use image_processing::sampling::{calculate_in_sample_size, BoundingBox, ImageDimensions};
pub use image_processing::source::{FileStreamOpener, MemoryStreamOpener, StreamOpener};
pub use image_processing::{ImagePreprocessor, PreprocessError};
