use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::time::Instant;

use rotation_handler::cli::Args;
use rotation_handler::utils::{
    create_progress_bar, format_duration, validate_inputs, verbose_println, warn_println,
};
use rotation_handler::{ProcessingConfig, ProcessingEngine};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let mut args = Args::parse();
    args.load_and_merge_config()?;

    init_logging(args.verbose);

    // Print banner
    println!("{}", style("Rotation Handler - Upload Preprocessor").bold().blue());
    println!();

    validate_inputs(&args)?;

    let bounds = args.parse_bounds().map_err(|e| anyhow::anyhow!(e))?;
    let config = ProcessingConfig {
        bounds,
        max_size: args.max_size,
        extensions: args.parse_extensions(),
        output_dir: args.output_dir.clone(),
        parallel_jobs: args.job_count(),
        dry_run: args.dry_run,
        verbose: args.verbose,
    };

    if config.verbose {
        println!("{}", style("Configuration:").bold());
        println!("  Decode bounds: {}", config.bounds);
        match config.max_size {
            Some(max_size) => println!("  Max size: {}px", max_size),
            None => println!("  Max size: not set (keep sampled size)"),
        }
        println!("  Output directory: {}", config.output_dir.display());
        println!("  Parallel jobs: {}", config.parallel_jobs);
        println!("  Extensions: {:?}", config.extensions);
        println!("  Dry run: {}", config.dry_run);
        println!();
    }

    let engine = ProcessingEngine::new(config).context("Failed to create processing engine")?;
    let image_files = engine.discover_images(&args.input_paths)?;

    if image_files.is_empty() {
        warn_println("No image files found in the given inputs");
        return Ok(());
    }

    println!(
        "Processing {} image{}...",
        style(image_files.len()).bold(),
        if image_files.len() == 1 { "" } else { "s" }
    );

    let progress = create_progress_bar(image_files.len() as u64);
    let results = engine.process_batch(&image_files, |_, path| {
        if let Some(filename) = path.file_name().and_then(|f| f.to_str()) {
            progress.set_message(filename.to_string());
        }
        progress.inc(1);
    });
    progress.finish_and_clear();

    let mut processed = 0;
    let mut failed = 0;
    for result in &results {
        match result {
            Ok(done) => {
                processed += 1;
                verbose_println(
                    args.verbose,
                    &format!(
                        "{} -> {} ({}x{}, {} bytes)",
                        done.input_path.display(),
                        done.output_path.display(),
                        done.width,
                        done.height,
                        done.encoded_bytes
                    ),
                );
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {:#}", style("✗").red().bold(), e);
            }
        }
    }

    println!();
    if args.dry_run {
        println!("{}", style("Dry run: no files were written").yellow());
    }
    println!(
        "{} {} processed, {} failed in {}",
        style("✓").green().bold(),
        style(processed).green().bold(),
        if failed > 0 {
            style(failed).red().bold()
        } else {
            style(failed).dim()
        },
        format_duration(start_time.elapsed())
    );

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
