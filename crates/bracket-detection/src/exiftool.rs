//! Metadata extraction using exiftool for bracket detection
//!
//! This module provides batch metadata extraction using exiftool's stay-open
//! mode. One JSON request covers all input files; numeric output (`-n`) keeps
//! the Sony MakerNotes codes as integers instead of display strings.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::record::{parse_capture_time, CaptureRecord};

/// One entry of exiftool's `-json` output. Numeric tags are kept as raw JSON
/// values because exiftool occasionally emits them as strings.
#[derive(Deserialize)]
struct ExiftoolEntry {
    #[serde(rename = "SourceFile")]
    source_file: String,
    #[serde(rename = "Make")]
    make: Option<String>,
    #[serde(rename = "DateTimeOriginal")]
    date_time_original: Option<String>,
    #[serde(rename = "ExposureMode")]
    exposure_mode: Option<Value>,
    #[serde(rename = "ExposureCompensation")]
    exposure_compensation: Option<Value>,
    #[serde(rename = "ReleaseMode")]
    release_mode: Option<Value>,
    #[serde(rename = "SequenceImageNumber")]
    sequence_position: Option<Value>,
    #[serde(rename = "SequenceLength")]
    sequence_length: Option<Value>,
}

impl ExiftoolEntry {
    fn into_record(self) -> CaptureRecord {
        CaptureRecord {
            source_file: PathBuf::from(self.source_file),
            make: self.make,
            captured_at: self
                .date_time_original
                .as_deref()
                .and_then(parse_capture_time),
            exposure_mode: self.exposure_mode.as_ref().and_then(value_to_i64),
            exposure_compensation: self
                .exposure_compensation
                .as_ref()
                .and_then(value_to_f64),
            release_mode: self.release_mode.as_ref().and_then(value_to_i64),
            sequence_position: self.sequence_position.as_ref().and_then(value_to_u32),
            sequence_length: self.sequence_length.as_ref().and_then(value_to_u32),
        }
    }
}

fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse one exiftool JSON batch into capture records.
pub fn records_from_json(json: &str) -> Result<Vec<CaptureRecord>> {
    let entries: Vec<ExiftoolEntry> = serde_json::from_str(json).with_context(|| {
        let preview = if json.len() > 500 {
            format!("{}...(truncated, {} bytes total)", &json[..500], json.len())
        } else {
            json.to_string()
        };
        format!("Failed to parse exiftool JSON output. First bytes: {}", preview)
    })?;

    Ok(entries.into_iter().map(ExiftoolEntry::into_record).collect())
}

pub struct ExiftoolRunner {
    child: Child,
    stdin: BufWriter<std::process::ChildStdin>,
    stdout: BufReader<std::process::ChildStdout>,
}

impl ExiftoolRunner {
    /// Create a new ExiftoolRunner with a persistent exiftool process
    pub fn new() -> Result<Self> {
        let mut child = Command::new("exiftool")
            .args(["-stay_open", "True", "-@", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to spawn exiftool process. Make sure exiftool is installed and in PATH.")?;

        let stdin = BufWriter::new(
            child
                .stdin
                .take()
                .context("Failed to get stdin handle for exiftool process")?,
        );

        let stdout = BufReader::new(
            child
                .stdout
                .take()
                .context("Failed to get stdout handle for exiftool process")?,
        );

        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }

    /// Extract bracketing metadata from multiple image files in one batch.
    pub fn extract(&mut self, paths: &[PathBuf]) -> Result<Vec<CaptureRecord>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        // Write exiftool arguments
        writeln!(self.stdin, "-json")?;
        writeln!(self.stdin, "-n")?; // numeric values for the mode codes
        writeln!(self.stdin, "-fast")?; // -fast not -fast2: the sequence markers live in maker notes
        writeln!(self.stdin, "-Make")?;
        writeln!(self.stdin, "-DateTimeOriginal")?;
        writeln!(self.stdin, "-ExposureMode")?;
        writeln!(self.stdin, "-ExposureCompensation")?;
        writeln!(self.stdin, "-MakerNotes:ReleaseMode")?;
        writeln!(self.stdin, "-MakerNotes:SequenceImageNumber")?;
        writeln!(self.stdin, "-MakerNotes:SequenceLength")?;

        // Write file paths
        for path in paths {
            writeln!(self.stdin, "{}", path.display())?;
        }

        // Execute command
        writeln!(self.stdin, "-execute")?;
        self.stdin.flush()?;

        // Read JSON output until {ready} sentinel
        let mut json_output = String::new();
        loop {
            let mut line = String::new();
            let bytes_read = self.stdout.read_line(&mut line)?;
            if bytes_read == 0 {
                bail!("Unexpected EOF from exiftool process");
            }

            let trimmed = line.trim();
            if trimmed.starts_with("{ready") && trimmed.ends_with('}') {
                break;
            }
            json_output.push_str(&line);
        }

        records_from_json(&json_output)
    }
}

impl Drop for ExiftoolRunner {
    fn drop(&mut self) {
        // Gracefully shut down exiftool
        let _ = writeln!(self.stdin, "-stay_open");
        let _ = writeln!(self.stdin, "False");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
    }
}
