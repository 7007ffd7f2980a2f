//! Capture metadata records for bracket detection
//!
//! A `CaptureRecord` is one image file's relevant metadata snapshot, as
//! reported by the extraction collaborator. Sony marks in-camera bracketing
//! bursts with a trio of MakerNotes tags: a continuous-bracket release mode,
//! an auto-bracket exposure mode, and a 1-based sequence position/length pair.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The only camera make whose sequence markers this tool understands.
pub const SUPPORTED_MAKE: &str = "SONY";

/// MakerNotes:ReleaseMode value for continuous exposure bracketing.
pub const RELEASE_MODE_CONTINUOUS_BRACKET: i64 = 5;

/// EXIF:ExposureMode value for auto bracket.
pub const EXPOSURE_MODE_AUTO_BRACKET: i64 = 2;

/// EXIF DateTimeOriginal textual format (second resolution).
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// Path of the image file; unique key and sort key.
    pub source_file: PathBuf,
    /// Camera manufacturer.
    pub make: Option<String>,
    /// Capture timestamp, second resolution.
    pub captured_at: Option<NaiveDateTime>,
    /// EXIF exposure mode code.
    pub exposure_mode: Option<i64>,
    /// Exposure compensation in EV.
    pub exposure_compensation: Option<f64>,
    /// Sony release mode code.
    pub release_mode: Option<i64>,
    /// 1-based position within the burst.
    pub sequence_position: Option<u32>,
    /// Camera-declared total burst size.
    pub sequence_length: Option<u32>,
}

impl CaptureRecord {
    /// Check whether this capture can belong to a bracketing burst at all.
    ///
    /// Requires the continuous-bracket release mode, the auto-bracket exposure
    /// mode, and a declared sequence length greater than one.
    pub fn is_burst_eligible(&self) -> bool {
        self.release_mode == Some(RELEASE_MODE_CONTINUOUS_BRACKET)
            && self.exposure_mode == Some(EXPOSURE_MODE_AUTO_BRACKET)
            && self.sequence_length.unwrap_or(0) > 1
    }

    /// Check whether this capture opens a new burst (sequence position 1).
    /// An absent position never starts a burst.
    pub fn starts_sequence(&self) -> bool {
        self.sequence_position == Some(1)
    }
}

/// Parse an EXIF `DateTimeOriginal` string (`YYYY:MM:DD HH:MM:SS`).
pub fn parse_capture_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, EXIF_DATETIME_FORMAT).ok()
}
