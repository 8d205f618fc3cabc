use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;
use clap::Parser;
use ct_triage::{Config, EncodedStack, Pipeline, SelectionMode};
use serde_json::json;

/// Analyse a directory of CT DICOM files and print the verdict as JSON.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Directory with the extracted study
    dir: PathBuf,

    /// Analyse every series instead of only the largest one
    #[arg(long)]
    all_series: bool,

    /// Write an RGB preview PNG of every encoded slice into this directory
    #[arg(long)]
    preview_dir: Option<PathBuf>,

    /// Write the raw f32 encoded stack of each series into this directory
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Override K_SLICES
    #[arg(long)]
    k_slices: Option<usize>,

    /// Override IMG_SIZE
    #[arg(long)]
    img_size: Option<usize>,
}

fn file_stem(series_id: &str) -> String {
    series_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
        .collect()
}

fn write_previews(dir: &Path, series_id: &str, stack: &EncodedStack) -> anyhow::Result<()> {
    let series_dir = dir.join(file_stem(series_id));
    fs::create_dir_all(&series_dir)?;
    for z in 0..stack.len() {
        let image = stack.preview(z).context("preview has wrong size")?;
        image.save(series_dir.join(format!("{z:04}.png")))?;
    }
    Ok(())
}

fn write_dump(dir: &Path, series_id: &str, stack: &EncodedStack) -> anyhow::Result<()> {
    fs::create_dir_all(dir)?;
    let bytes = stack.as_bytes().context("encoded stack is not contiguous")?;
    let (depth, channels, height, width) = stack.dim();
    let path = dir.join(format!(
        "{}_{depth}x{channels}x{height}x{width}.f32",
        file_stem(series_id)
    ));
    fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = Config::from_env()?;
    if let Some(k_slices) = cli.k_slices {
        config.k_slices = k_slices;
    }
    if let Some(img_size) = cli.img_size {
        config.img_size = img_size;
    }
    let pipeline = Pipeline::new(config)?;

    let mode = if cli.all_series {
        SelectionMode::Multi
    } else {
        SelectionMode::Single
    };

    log::info!("Analysing {}", cli.dir.display());
    let result = pipeline.analyze_directory_with(&cli.dir, mode, |series_id, stack| {
        if let Some(dir) = &cli.preview_dir {
            if let Err(e) = write_previews(dir, series_id, stack) {
                log::error!("Failed to write previews for {series_id}: {e:#}");
            }
        }
        if let Some(dir) = &cli.dump_dir {
            if let Err(e) = write_dump(dir, series_id, stack) {
                log::error!("Failed to dump stack for {series_id}: {e:#}");
            }
        }
    });

    match result {
        Ok(analysis) => {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            let body = json!({
                "error": failure.error.to_string(),
                "warnings": failure.warnings,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
