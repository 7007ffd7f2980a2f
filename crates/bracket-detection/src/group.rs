//! Sequence partitioning for bracket detection
//!
//! This module splits a batch of capture records into bracketing groups using
//! Sony's sequence-position markers. Records are sorted by source file, the
//! whole batch is gated on the supported camera make, and a two-state machine
//! (idle / accumulating) seals a group whenever a new position-1 frame is seen.

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::record::{CaptureRecord, SUPPORTED_MAKE};

/// An ordered, non-empty run of captures from one bracketing operation.
/// Immutable once sealed; member order is the source-file sort order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketGroup {
    pub images: Vec<CaptureRecord>,
}

impl BracketGroup {
    pub fn new(images: Vec<CaptureRecord>) -> Self {
        Self { images }
    }

    pub fn frame_count(&self) -> usize {
        self.images.len()
    }
}

/// Outcome of one detection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketResult {
    /// Detected bracketing groups, in input sort order.
    pub groups: Vec<BracketGroup>,
    /// Bracketed captures seen before any sequence start; dropped from output.
    pub orphaned: Vec<PathBuf>,
}

impl BracketResult {
    /// Get total number of grouped images
    pub fn total_images(&self) -> usize {
        self.groups.iter().map(|g| g.frame_count()).sum()
    }

    /// Get total number of detected groups
    pub fn total_groups(&self) -> usize {
        self.groups.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartitionState {
    Idle,
    Accumulating,
}

/// The accumulator state machine. Fed one record at a time in sorted order;
/// ineligible records pass through without disturbing the current group.
struct Partitioner {
    state: PartitionState,
    current: Vec<CaptureRecord>,
    groups: Vec<BracketGroup>,
    orphaned: Vec<PathBuf>,
}

impl Partitioner {
    fn new() -> Self {
        Self {
            state: PartitionState::Idle,
            current: Vec::new(),
            groups: Vec::new(),
            orphaned: Vec::new(),
        }
    }

    fn push(&mut self, record: CaptureRecord) {
        if !record.is_burst_eligible() {
            return;
        }

        if record.starts_sequence() {
            self.seal_current();
            self.current.push(record);
            self.state = PartitionState::Accumulating;
        } else {
            match self.state {
                // Contiguity of positions is the validator's business.
                PartitionState::Accumulating => self.current.push(record),
                // A mid-sequence frame with no preceding start; never group it.
                PartitionState::Idle => self.orphaned.push(record.source_file),
            }
        }
    }

    fn seal_current(&mut self) {
        if !self.current.is_empty() {
            self.groups
                .push(BracketGroup::new(std::mem::take(&mut self.current)));
        }
    }

    fn finish(mut self) -> (Vec<BracketGroup>, Vec<PathBuf>) {
        self.seal_current();
        (self.groups, self.orphaned)
    }
}

pub struct BracketDetector;

impl BracketDetector {
    /// Detect bracketing groups from a batch of capture records.
    ///
    /// Sorts by source file, rejects the whole batch if any record is from an
    /// unsupported camera make, then partitions on sequence-position markers.
    pub fn detect(mut records: Vec<CaptureRecord>) -> Result<BracketResult> {
        records.sort_by(|a, b| a.source_file.cmp(&b.source_file));

        ensure_supported_make(&records)?;

        let mut partitioner = Partitioner::new();
        for record in records {
            partitioner.push(record);
        }
        let (groups, orphaned) = partitioner.finish();

        Ok(BracketResult { groups, orphaned })
    }
}

/// Whole-batch precondition: every record must come from a SONY camera.
/// All-or-nothing; runs before any partitioning state exists.
fn ensure_supported_make(records: &[CaptureRecord]) -> Result<()> {
    for record in records {
        if record.make.as_deref() != Some(SUPPORTED_MAKE) {
            bail!(
                "{} was taken with an unsupported camera make ({}); only SONY cameras are supported at the moment",
                record.source_file.display(),
                record.make.as_deref().unwrap_or("unknown"),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{
        parse_capture_time, EXPOSURE_MODE_AUTO_BRACKET, RELEASE_MODE_CONTINUOUS_BRACKET,
    };
    use chrono::Duration;

    fn bracketed(path: &str, position: u32, length: u32, ev: f64, offset_secs: i64) -> CaptureRecord {
        let base = parse_capture_time("2024:01:15 14:30:00").unwrap();
        CaptureRecord {
            source_file: PathBuf::from(path),
            make: Some("SONY".to_string()),
            captured_at: Some(base + Duration::seconds(offset_secs)),
            exposure_mode: Some(EXPOSURE_MODE_AUTO_BRACKET),
            exposure_compensation: Some(ev),
            release_mode: Some(RELEASE_MODE_CONTINUOUS_BRACKET),
            sequence_position: Some(position),
            sequence_length: Some(length),
        }
    }

    fn single_shot(path: &str) -> CaptureRecord {
        CaptureRecord {
            source_file: PathBuf::from(path),
            make: Some("SONY".to_string()),
            captured_at: parse_capture_time("2024:01:15 14:30:00"),
            exposure_mode: Some(0),
            exposure_compensation: Some(0.0),
            release_mode: Some(0),
            sequence_position: None,
            sequence_length: None,
        }
    }

    fn paths(group: &BracketGroup) -> Vec<String> {
        group
            .images
            .iter()
            .map(|r| r.source_file.display().to_string())
            .collect()
    }

    #[test]
    fn test_single_complete_group() {
        let records = vec![
            bracketed("DSC00001.ARW", 1, 3, 0.0, 0),
            bracketed("DSC00002.ARW", 2, 3, -1.0, 1),
            bracketed("DSC00003.ARW", 3, 3, 1.0, 2),
        ];

        let result = BracketDetector::detect(records).unwrap();

        assert_eq!(result.total_groups(), 1);
        assert_eq!(result.groups[0].frame_count(), 3);
        assert_eq!(
            paths(&result.groups[0]),
            vec!["DSC00001.ARW", "DSC00002.ARW", "DSC00003.ARW"]
        );
        assert!(result.orphaned.is_empty());
    }

    #[test]
    fn test_back_to_back_groups_split_on_position_one() {
        let records = vec![
            bracketed("DSC00001.ARW", 1, 2, 0.0, 0),
            bracketed("DSC00002.ARW", 2, 2, -1.0, 1),
            bracketed("DSC00003.ARW", 1, 2, 0.0, 10),
            bracketed("DSC00004.ARW", 2, 2, -1.0, 11),
        ];

        let result = BracketDetector::detect(records).unwrap();

        assert_eq!(result.total_groups(), 2);
        assert_eq!(paths(&result.groups[0]), vec!["DSC00001.ARW", "DSC00002.ARW"]);
        assert_eq!(paths(&result.groups[1]), vec!["DSC00003.ARW", "DSC00004.ARW"]);
    }

    #[test]
    fn test_ineligible_records_are_skipped_without_sealing() {
        // A single-shot frame landing between two members of a burst must not
        // close the accumulator or show up in any group.
        let records = vec![
            bracketed("DSC00001.ARW", 1, 2, 0.0, 0),
            single_shot("DSC00002.JPG"),
            bracketed("DSC00003.ARW", 2, 2, -1.0, 1),
        ];

        let result = BracketDetector::detect(records).unwrap();

        assert_eq!(result.total_groups(), 1);
        assert_eq!(paths(&result.groups[0]), vec!["DSC00001.ARW", "DSC00003.ARW"]);
        assert!(result.orphaned.is_empty());
    }

    #[test]
    fn test_orphaned_mid_sequence_frame_is_dropped_and_reported() {
        let records = vec![
            bracketed("DSC00001.ARW", 2, 3, -1.0, 0),
            bracketed("DSC00002.ARW", 1, 2, 0.0, 10),
            bracketed("DSC00003.ARW", 2, 2, -1.0, 11),
        ];

        let result = BracketDetector::detect(records).unwrap();

        assert_eq!(result.orphaned, vec![PathBuf::from("DSC00001.ARW")]);
        assert_eq!(result.total_groups(), 1);
        assert_eq!(paths(&result.groups[0]), vec!["DSC00002.ARW", "DSC00003.ARW"]);
    }

    #[test]
    fn test_absent_position_never_starts_a_group() {
        let mut headless = bracketed("DSC00001.ARW", 1, 3, 0.0, 0);
        headless.sequence_position = None;

        let result = BracketDetector::detect(vec![headless]).unwrap();

        assert_eq!(result.total_groups(), 0);
        assert_eq!(result.orphaned, vec![PathBuf::from("DSC00001.ARW")]);
    }

    #[test]
    fn test_unsupported_make_rejects_whole_batch() {
        let mut canon = bracketed("IMG_0001.CR3", 1, 3, 0.0, 0);
        canon.make = Some("Canon".to_string());
        let records = vec![bracketed("DSC00001.ARW", 1, 3, 0.0, 0), canon];

        let err = BracketDetector::detect(records).unwrap_err();
        assert!(err.to_string().contains("only SONY cameras"));
    }

    #[test]
    fn test_missing_make_rejects_whole_batch() {
        let mut unknown = single_shot("DSC00001.ARW");
        unknown.make = None;

        assert!(BracketDetector::detect(vec![unknown]).is_err());
    }

    #[test]
    fn test_detection_sorts_by_source_file() {
        let records = vec![
            bracketed("DSC00002.ARW", 2, 2, -1.0, 1),
            bracketed("DSC00001.ARW", 1, 2, 0.0, 0),
        ];

        let result = BracketDetector::detect(records).unwrap();

        assert_eq!(result.total_groups(), 1);
        assert_eq!(paths(&result.groups[0]), vec!["DSC00001.ARW", "DSC00002.ARW"]);
    }

    #[test]
    fn test_detection_is_idempotent_on_sorted_input() {
        let records = vec![
            bracketed("DSC00001.ARW", 1, 2, 0.0, 0),
            bracketed("DSC00002.ARW", 2, 2, -1.0, 1),
            bracketed("DSC00003.ARW", 1, 2, 0.0, 10),
            bracketed("DSC00004.ARW", 2, 2, -1.0, 11),
        ];

        let first = BracketDetector::detect(records.clone()).unwrap();
        let second = BracketDetector::detect(records).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_group_count_equals_position_one_count() {
        let records = vec![
            bracketed("DSC00001.ARW", 1, 2, 0.0, 0),
            bracketed("DSC00002.ARW", 2, 2, -1.0, 1),
            bracketed("DSC00003.ARW", 1, 3, 0.0, 10),
            bracketed("DSC00004.ARW", 2, 3, -1.0, 11),
            bracketed("DSC00005.ARW", 3, 3, 1.0, 12),
            single_shot("DSC00006.JPG"),
        ];
        let starts = records
            .iter()
            .filter(|r| r.is_burst_eligible() && r.starts_sequence())
            .count();

        let result = BracketDetector::detect(records).unwrap();
        assert_eq!(result.total_groups(), starts);
    }

    #[test]
    fn test_groups_partition_eligible_records() {
        // No record appears twice, and every grouped record was eligible.
        let records = vec![
            bracketed("DSC00001.ARW", 1, 2, 0.0, 0),
            bracketed("DSC00002.ARW", 2, 2, -1.0, 1),
            single_shot("DSC00003.JPG"),
            bracketed("DSC00004.ARW", 1, 2, 0.0, 10),
            bracketed("DSC00005.ARW", 2, 2, -1.0, 11),
        ];

        let result = BracketDetector::detect(records.clone()).unwrap();

        let mut seen: Vec<PathBuf> = result
            .groups
            .iter()
            .flat_map(|g| g.images.iter().map(|r| r.source_file.clone()))
            .collect();
        let total = seen.len();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), total);

        let eligible: Vec<PathBuf> = records
            .iter()
            .filter(|r| r.is_burst_eligible())
            .map(|r| r.source_file.clone())
            .collect();
        assert!(seen.iter().all(|p| eligible.contains(p)));
        assert_eq!(result.total_images(), 4);
    }

    #[test]
    fn test_empty_input_yields_empty_result() {
        let result = BracketDetector::detect(Vec::new()).unwrap();
        assert_eq!(result.total_groups(), 0);
        assert_eq!(result.total_images(), 0);
        assert!(result.orphaned.is_empty());
    }
}
