//! Flat-file output of detected groups
//!
//! The grouping file is consumed by merge tooling downstream: each group is a
//! literal `#group` line followed by one member path per line, in burst order.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::group::BracketGroup;

pub const GROUP_HEADER: &str = "#group";

/// Write the grouping file. Member paths appear exactly as extracted, one per
/// line; no indices, no checksums, no trailing metadata.
pub fn write_groups(path: &Path, groups: &[BracketGroup]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    let mut out = BufWriter::new(file);

    for group in groups {
        writeln!(out, "{}", GROUP_HEADER)?;
        for image in &group.images {
            writeln!(out, "{}", image.source_file.display())?;
        }
    }

    out.flush()
        .with_context(|| format!("Failed to write output file {}", path.display()))
}
