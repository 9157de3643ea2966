use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use rotation_handler::test_support::jpeg_with_orientation;
use rotation_handler::{BoundingBox, ProcessingConfig, ProcessingEngine};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

fn create_test_image(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 200])
    })
}

fn write_image(dir: &Path, name: &str, bytes: &[u8]) {
    fs::write(dir.join(name), bytes).unwrap();
}

fn config(output_dir: &Path, max_size: Option<u32>) -> ProcessingConfig {
    ProcessingConfig {
        bounds: BoundingBox::new(100, 100).unwrap(),
        max_size,
        extensions: vec!["jpg".to_string(), "png".to_string()],
        output_dir: output_dir.to_path_buf(),
        parallel_jobs: 2,
        dry_run: false,
        verbose: false,
    }
}

#[test]
fn test_batch_writes_upright_downsampled_images() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    write_image(
        input.path(),
        "portrait.jpg",
        &jpeg_with_orientation(&create_test_image(300, 400), 6).unwrap(),
    );
    write_image(
        input.path(),
        "upright.jpg",
        &jpeg_with_orientation(&create_test_image(80, 60), 1).unwrap(),
    );
    write_image(input.path(), "notes.txt", b"not an image");

    let engine = ProcessingEngine::new(config(output.path(), None)).unwrap();
    let files = engine.discover_images(&[input.path().to_path_buf()]).unwrap();
    assert_eq!(files.len(), 2);

    let results = engine.process_batch(&files, |_, _| {});
    assert!(results.iter().all(|r| r.is_ok()));

    let portrait = image::open(output.path().join("portrait_jpg_upload.jpg")).unwrap();
    assert_eq!((portrait.width(), portrait.height()), (133, 100));

    let upright = image::open(output.path().join("upright_jpg_upload.jpg")).unwrap();
    assert_eq!((upright.width(), upright.height()), (80, 60));
}

#[test]
fn test_batch_applies_max_size() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let source = input.path().join("wide.jpg");
    fs::write(&source, jpeg_with_orientation(&create_test_image(160, 80), 1).unwrap()).unwrap();

    let engine = ProcessingEngine::new(config(output.path(), Some(40))).unwrap();
    let result = engine.process_single_image(&source).unwrap();
    assert_eq!((result.width, result.height), (40, 20));

    let written = image::open(&result.output_path).unwrap();
    assert_eq!((written.width(), written.height()), (40, 20));
}

#[test]
fn test_corrupt_file_fails_without_stopping_batch() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    write_image(input.path(), "broken.jpg", b"\xFF\xD8\xFF garbage");
    write_image(
        input.path(),
        "good.jpg",
        &jpeg_with_orientation(&create_test_image(40, 30), 3).unwrap(),
    );

    let engine = ProcessingEngine::new(config(output.path(), None)).unwrap();
    let files = engine.discover_images(&[input.path().to_path_buf()]).unwrap();
    let results = engine.process_batch(&files, |_, _| {});

    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

    let err = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(format!("{:#}", err).contains("broken.jpg"));
    assert!(output.path().join("good_jpg_upload.jpg").exists());
    assert!(!output.path().join("broken_jpg_upload.jpg").exists());
}

#[test]
fn test_dry_run_writes_nothing() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let source = input.path().join("photo.png");

    let mut png = Cursor::new(Vec::new());
    create_test_image(50, 50)
        .write_to(&mut png, ImageFormat::Png)
        .unwrap();
    fs::write(&source, png.into_inner()).unwrap();

    let mut cfg = config(output.path(), None);
    cfg.dry_run = true;
    let engine = ProcessingEngine::new(cfg).unwrap();

    let result = engine.process_single_image(&source).unwrap();
    assert!(result.encoded_bytes > 0);
    assert!(!result.output_path.exists());
}

fn png_bytes(img: &RgbImage) -> Vec<u8> {
    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, ImageFormat::Png).unwrap();
    png.into_inner()
}

#[test]
fn test_same_stem_different_extension_keeps_both_outputs() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    write_image(
        input.path(),
        "photo.jpg",
        &jpeg_with_orientation(&create_test_image(60, 40), 1).unwrap(),
    );
    write_image(input.path(), "photo.png", &png_bytes(&create_test_image(30, 50)));

    let engine = ProcessingEngine::new(config(output.path(), None)).unwrap();
    let files = engine.discover_images(&[input.path().to_path_buf()]).unwrap();
    let results = engine.process_batch(&files, |_, _| {});
    assert!(results.iter().all(|r| r.is_ok()));

    let from_jpg = image::open(output.path().join("photo_jpg_upload.jpg")).unwrap();
    assert_eq!((from_jpg.width(), from_jpg.height()), (60, 40));

    let from_png = image::open(output.path().join("photo_png_upload.jpg")).unwrap();
    assert_eq!((from_png.width(), from_png.height()), (30, 50));
}

#[test]
fn test_colliding_outputs_fail_instead_of_overwriting() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let first_dir = input.path().join("a");
    let second_dir = input.path().join("b");
    fs::create_dir_all(&first_dir).unwrap();
    fs::create_dir_all(&second_dir).unwrap();

    write_image(
        &first_dir,
        "photo.jpg",
        &jpeg_with_orientation(&create_test_image(60, 40), 1).unwrap(),
    );
    write_image(
        &second_dir,
        "photo.jpg",
        &jpeg_with_orientation(&create_test_image(20, 30), 1).unwrap(),
    );

    let engine = ProcessingEngine::new(config(output.path(), None)).unwrap();
    let files: Vec<PathBuf> = engine.discover_images(&[input.path().to_path_buf()]).unwrap();
    assert_eq!(files.len(), 2);

    let results = engine.process_batch(&files, |_, _| {});
    assert!(results[0].is_ok());
    let err = results[1].as_ref().unwrap_err();
    assert!(format!("{:#}", err).contains("already produced by"));

    // The first input in sorted order owns the output
    let written = image::open(output.path().join("photo_jpg_upload.jpg")).unwrap();
    assert_eq!((written.width(), written.height()), (60, 40));
}
