use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use bracket_detection::output::write_groups;
use bracket_detection::{validate, BracketDetector, ExiftoolRunner};

#[derive(Parser)]
#[command(name = "bracket-group")]
#[command(about = "Group Sony bracketed photos into burst sequences")]
struct Cli {
    /// Directory containing the bracketed captures
    #[arg(short, long)]
    input: PathBuf,

    /// Extension of the capture files
    #[arg(short, long, default_value = "ARW")]
    extension: String,

    /// Path of the output file listing the detected groups
    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let image_files = scan_input_dir(&cli.input, &cli.extension)?;
    if image_files.is_empty() {
        bail!(
            "No files found with extension {} in {}",
            cli.extension,
            cli.input.display()
        );
    }

    let mut runner = ExiftoolRunner::new()?;
    let records = runner.extract(&image_files)?;

    let result = BracketDetector::detect(records)?;

    for orphan in &result.orphaned {
        eprintln!(
            "Warning: {} is bracketed but does not start a sequence; dropping it",
            orphan.display()
        );
    }
    for group in &result.groups {
        for warning in validate(group) {
            eprintln!("Warning: {}", warning);
        }
    }

    write_groups(&cli.output, &result.groups)?;

    println!(
        "Detected {} groups and wrote the results to {}.",
        result.total_groups(),
        cli.output.display()
    );
    Ok(())
}

/// Collect files in `dir` whose name ends with `.extension`, matched
/// case-insensitively. Non-recursive, like the camera's own flat card layout.
fn scan_input_dir(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let suffix = format!(".{}", extension.to_lowercase());
    let mut files = Vec::new();

    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.to_lowercase().ends_with(&suffix) {
                files.push(path);
            }
        }
    }

    Ok(files)
}
