use clap::Parser;
use std::path::PathBuf;

use crate::image_processing::sampling::BoundingBox;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rotation-handler",
    about = "Prepare photos for upload: fix EXIF rotation, downsample and re-encode",
    long_about = "
Rotation Handler - upload image preprocessor

Loads each photo downsampled to fit a memory-friendly bounding box, rotates it
upright according to its EXIF orientation tag and writes it back out as a JPEG.
With --max-size the longer side is scaled to exactly that many pixels before
encoding.

Example Usage:
  # Upright copies of every photo in a directory, decoded within 1024x1024
  rotation-handler -i ~/Photos -o ~/upload

  # Single file, re-encoded with its longer side at 800 pixels
  rotation-handler -i ~/Photos/IMG_001.jpg -o ~/upload --max-size 800

  # Settings from a JSON file, command-line flags still win
  rotation-handler --config upload.json -o ~/elsewhere --verbose

  # Show what would be written without touching the disk
  rotation-handler -i ~/Photos -o ~/upload --dry-run"
)]
pub struct Args {
    /// Input directories or single image files (can be specified multiple times)
    #[arg(short = 'i', long = "input", value_name = "DIR|FILE")]
    pub input_paths: Vec<PathBuf>,

    /// Output directory for processed images
    #[arg(short = 'o', long = "output", value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Bounding box for the downsampled decode (format: WIDTHxHEIGHT)
    #[arg(
        short = 'b',
        long = "bounds",
        default_value = "1024x1024",
        value_name = "WIDTHxHEIGHT"
    )]
    pub bounds: String,

    /// Scale the longer side to this many pixels before encoding
    #[arg(short = 'm', long = "max-size", value_name = "PIXELS")]
    pub max_size: Option<u32>,

    /// Comma-separated list of image extensions to process
    #[arg(long = "extensions", default_value = "jpg,jpeg,png,webp,tiff")]
    pub extensions_str: String,

    /// Number of parallel processing jobs (0 = auto-detect CPU cores)
    #[arg(short = 'j', long = "jobs", default_value = "0", value_name = "N")]
    pub jobs: usize,

    /// JSON configuration file; explicit command-line flags take precedence
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Simulate processing and report outputs without writing files
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Args {
    /// Parse the bounds string into a bounding box
    pub fn parse_bounds(&self) -> Result<BoundingBox, String> {
        BoundingBox::parse(&self.bounds)
    }

    /// Parse the comma-separated extensions, lowercased, without dots
    pub fn parse_extensions(&self) -> Vec<String> {
        self.extensions_str
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }

    /// Effective worker count
    pub fn job_count(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("rotation-handler").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["-i", "photos"]);
        assert_eq!(args.input_paths, vec![PathBuf::from("photos")]);
        assert_eq!(args.output_dir, PathBuf::from("."));
        assert_eq!(args.parse_bounds().unwrap(), BoundingBox::default());
        assert_eq!(args.max_size, None);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_multiple_inputs_and_options() {
        let args = parse(&[
            "-i", "a.jpg", "-i", "dir", "-o", "out", "-b", "640x480", "-m", "400", "-j", "2",
        ]);
        assert_eq!(args.input_paths.len(), 2);
        assert_eq!(args.parse_bounds().unwrap(), BoundingBox::new(640, 480).unwrap());
        assert_eq!(args.max_size, Some(400));
        assert_eq!(args.job_count(), 2);
    }

    #[test]
    fn test_parse_extensions() {
        let args = parse(&["--extensions", "JPG, .png,,webp"]);
        assert_eq!(args.parse_extensions(), vec!["jpg", "png", "webp"]);
    }

    #[test]
    fn test_auto_job_count() {
        let args = parse(&[]);
        assert!(args.job_count() >= 1);
    }
}
