use anyhow::{Context, Result};
use log::{debug, info};
use rayon::prelude::*;
use std::collections::hash_map::{Entry, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use walkdir::WalkDir;

use crate::image_processing::codec::BitmapCodec;
use crate::image_processing::resize::JPEG_QUALITY;
use crate::image_processing::sampling::BoundingBox;
use crate::image_processing::source::FileStreamOpener;
use crate::image_processing::ImagePreprocessor;
use crate::utils::{has_valid_extension, output_path_for, verbose_println};

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub bounds: BoundingBox,
    pub max_size: Option<u32>,
    pub extensions: Vec<String>,
    pub output_dir: PathBuf,
    pub parallel_jobs: usize,
    pub dry_run: bool,
    pub verbose: bool,
}

/// Outcome of one successfully processed image
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub encoded_bytes: usize,
}

pub struct ProcessingEngine {
    config: ProcessingConfig,
    preprocessor: ImagePreprocessor<FileStreamOpener>,
    pool: rayon::ThreadPool,
}

impl ProcessingEngine {
    pub fn new(config: ProcessingConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_jobs.max(1))
            .build()
            .context("Failed to initialize thread pool")?;

        let preprocessor = ImagePreprocessor::new(FileStreamOpener::new()).with_bounds(config.bounds);

        Ok(Self {
            config,
            preprocessor,
            pool,
        })
    }

    /// Discover all image files in the input paths
    pub fn discover_images(&self, input_paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut image_files = Vec::new();

        for input_path in input_paths {
            if input_path.is_file() {
                image_files.push(input_path.clone());
                continue;
            }

            verbose_println(
                self.config.verbose,
                &format!("Scanning directory: {}", input_path.display()),
            );

            let walker = WalkDir::new(input_path).follow_links(false).max_depth(10);

            for entry in walker {
                let entry = entry.context("Failed to read directory entry")?;
                let path = entry.path();

                if path.is_file() && has_valid_extension(path, &self.config.extensions) {
                    image_files.push(path.to_path_buf());
                }
            }
        }

        // Sort for consistent processing order
        image_files.sort();
        image_files.dedup();

        verbose_println(
            self.config.verbose,
            &format!("Found {} image files", image_files.len()),
        );
        Ok(image_files)
    }

    /// Process a batch of images in parallel, reporting each completion
    ///
    /// When two inputs map to the same output file, the first one in
    /// `image_files` is processed and the later ones fail.
    pub fn process_batch<F>(
        &self,
        image_files: &[PathBuf],
        progress_callback: F,
    ) -> Vec<Result<ProcessingResult>>
    where
        F: Fn(usize, &Path) + Send + Sync,
    {
        let owners = self.claim_output_paths(image_files);
        let processed_count = AtomicUsize::new(0);

        self.pool.install(|| {
            image_files
                .par_iter()
                .zip(owners.par_iter())
                .map(|(image_path, owner)| {
                    let result = match owner {
                        Some(first) => Err(anyhow::anyhow!(
                            "Output {} for {} is already produced by {}",
                            output_path_for(image_path, &self.config.output_dir).display(),
                            image_path.display(),
                            first.display()
                        )),
                        None => self.process_single_image(image_path),
                    };

                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                    progress_callback(count, image_path);

                    result
                })
                .collect()
        })
    }

    /// For each input, the earlier input whose output path it would overwrite
    fn claim_output_paths<'a>(&self, image_files: &'a [PathBuf]) -> Vec<Option<&'a Path>> {
        let mut owners: HashMap<PathBuf, &'a Path> = HashMap::new();

        image_files
            .iter()
            .map(|image_path| {
                let output_path = output_path_for(image_path, &self.config.output_dir);
                match owners.entry(output_path) {
                    Entry::Occupied(entry) => {
                        debug!(
                            "{} collides with {} on {}",
                            image_path.display(),
                            entry.get().display(),
                            entry.key().display()
                        );
                        Some(*entry.get())
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(image_path.as_path());
                        None
                    }
                }
            })
            .collect()
    }

    /// Load, orient, optionally shrink and write a single image
    pub fn process_single_image(&self, input_path: &Path) -> Result<ProcessingResult> {
        debug!("Processing {}", input_path.display());

        let upright = self
            .preprocessor
            .handle_rotation(input_path)
            .with_context(|| format!("Failed to load image: {}", input_path.display()))?;

        let output = match self.config.max_size {
            Some(max_size) => self
                .preprocessor
                .get_resized_bitmap(&upright, max_size)
                .with_context(|| format!("Failed to reduce image: {}", input_path.display()))?,
            None => upright,
        };

        let encoded = self
            .preprocessor
            .codec()
            .encode_jpeg(&output, JPEG_QUALITY)
            .with_context(|| format!("Failed to encode image: {}", input_path.display()))?;

        let (width, height) = output.dimensions();
        let output_path = output_path_for(input_path, &self.config.output_dir);

        if self.config.dry_run {
            info!(
                "Dry run: would write {} ({}x{}, {} bytes)",
                output_path.display(),
                width,
                height,
                encoded.len()
            );
        } else {
            fs::create_dir_all(&self.config.output_dir).with_context(|| {
                format!(
                    "Failed to create output directory: {}",
                    self.config.output_dir.display()
                )
            })?;
            fs::write(&output_path, &encoded)
                .with_context(|| format!("Failed to write output: {}", output_path.display()))?;
        }

        Ok(ProcessingResult {
            input_path: input_path.to_path_buf(),
            output_path,
            width,
            height,
            encoded_bytes: encoded.len(),
        })
    }
}
