//! Bracketed-burst detection library for bracket-group
//!
//! This crate groups Sony exposure-bracketed captures into burst sequences
//! using the camera's MakerNotes sequence markers, and validates each detected
//! group for timing, completeness and exposure symmetry.

pub mod exiftool;
pub mod group;
pub mod output;
pub mod record;
pub mod validate;

pub use exiftool::ExiftoolRunner;
pub use group::{BracketDetector, BracketGroup, BracketResult};
pub use record::CaptureRecord;
pub use validate::{validate, GroupWarning};
