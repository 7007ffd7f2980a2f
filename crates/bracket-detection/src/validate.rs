//! Advisory validation of detected bracketing groups
//!
//! Five independent checks per group: frame timing, declared-length agreement,
//! completeness and ordering of sequence positions, exposure-compensation
//! uniqueness, and symmetry of the bracket around the reference frame. A group
//! is never rejected or mutated; every finding is a warning for the user.

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::group::BracketGroup;

/// Largest tolerated gap between adjacent frames of one burst, in seconds.
pub const MAX_FRAME_GAP_SECS: i64 = 5;

/// Tolerance for the reference-frame symmetry check. Must stay at 1e-6 so
/// warning output is stable across floating-point representations.
pub const SYMMETRY_TOLERANCE: f64 = 1e-6;

/// One advisory finding about a group. Groups are identified by their first
/// member's source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroupWarning {
    FrameGapExceeded {
        earlier: PathBuf,
        later: PathBuf,
        gap_secs: i64,
    },
    InconsistentSequenceLengths {
        group: PathBuf,
    },
    FewerImagesThanExpected {
        group: PathBuf,
        actual: usize,
        expected: u32,
    },
    NonMonotonicSequence {
        group: PathBuf,
        expected: u32,
    },
    DuplicateExposureCompensation {
        group: PathBuf,
    },
    AsymmetricReferenceFrame {
        group: PathBuf,
    },
}

impl fmt::Display for GroupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupWarning::FrameGapExceeded {
                earlier,
                later,
                gap_secs,
            } => write!(
                f,
                "time difference of {}s between {} and {} exceeds {} seconds",
                gap_secs,
                earlier.display(),
                later.display(),
                MAX_FRAME_GAP_SECS
            ),
            GroupWarning::InconsistentSequenceLengths { group } => write!(
                f,
                "inconsistent sequence lengths in group starting at {}",
                group.display()
            ),
            GroupWarning::FewerImagesThanExpected {
                group,
                actual,
                expected,
            } => write!(
                f,
                "group starting at {} has fewer images ({}) than expected ({})",
                group.display(),
                actual,
                expected
            ),
            GroupWarning::NonMonotonicSequence { group, expected } => write!(
                f,
                "sequence numbers in group starting at {} are not monotonically increasing from 1 to {}",
                group.display(),
                expected
            ),
            GroupWarning::DuplicateExposureCompensation { group } => write!(
                f,
                "exposure compensations in group starting at {} are not all unique",
                group.display()
            ),
            GroupWarning::AsymmetricReferenceFrame { group } => write!(
                f,
                "the first exposure compensation in group starting at {} is not the mean of the rest",
                group.display()
            ),
        }
    }
}

/// Run all checks on one group. Members missing an attribute a check needs are
/// skipped by that check.
pub fn validate(group: &BracketGroup) -> Vec<GroupWarning> {
    let mut warnings = Vec::new();
    let Some(first) = group.images.first() else {
        return warnings;
    };
    let key = first.source_file.clone();

    // Temporal cohesion: adjacent frames of one burst land within seconds of
    // each other.
    for pair in group.images.windows(2) {
        if let (Some(a), Some(b)) = (pair[0].captured_at, pair[1].captured_at) {
            let gap = (b - a).num_seconds().abs();
            if gap > MAX_FRAME_GAP_SECS {
                warnings.push(GroupWarning::FrameGapExceeded {
                    earlier: pair[0].source_file.clone(),
                    later: pair[1].source_file.clone(),
                    gap_secs: gap,
                });
            }
        }
    }

    // Every member should declare the same burst size.
    let mut lengths: Vec<u32> = group
        .images
        .iter()
        .filter_map(|r| r.sequence_length)
        .collect();
    lengths.sort_unstable();
    lengths.dedup();
    if lengths.len() > 1 {
        warnings.push(GroupWarning::InconsistentSequenceLengths { group: key.clone() });
    }

    // The first member's declaration is "the" length for the remaining checks.
    let declared = first.sequence_length.unwrap_or(0);

    if (group.images.len() as u32) < declared {
        warnings.push(GroupWarning::FewerImagesThanExpected {
            group: key.clone(),
            actual: group.images.len(),
            expected: declared,
        });
    } else {
        let positions: Vec<Option<u32>> =
            group.images.iter().map(|r| r.sequence_position).collect();
        let expected: Vec<Option<u32>> = (1..=declared).map(Some).collect();
        if positions != expected {
            warnings.push(GroupWarning::NonMonotonicSequence {
                group: key.clone(),
                expected: declared,
            });
        }
    }

    // Bracketed frames should each carry a distinct EV offset. Sorting keeps
    // 0.0 and -0.0 adjacent, so they compare as duplicates.
    let mut compensations: Vec<f64> = group
        .images
        .iter()
        .filter_map(|r| r.exposure_compensation)
        .collect();
    compensations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    if compensations.windows(2).any(|w| w[0] == w[1]) {
        warnings.push(GroupWarning::DuplicateExposureCompensation { group: key.clone() });
    }

    // Reference-frame symmetry: the first frame is the nominal exposure, so
    // the rest should average back to it. Only meaningful on complete groups.
    if group.images.len() > 1 && group.images.len() as u32 == declared {
        if let Some(reference) = first.exposure_compensation {
            let rest: Vec<f64> = group.images[1..]
                .iter()
                .filter_map(|r| r.exposure_compensation)
                .collect();
            if !rest.is_empty() {
                let mean = rest.iter().sum::<f64>() / rest.len() as f64;
                if (reference - mean).abs() >= SYMMETRY_TOLERANCE {
                    warnings.push(GroupWarning::AsymmetricReferenceFrame { group: key });
                }
            }
        }
    }

    warnings
}
