use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::core::geometry::Point3D;
use crate::utils::validation::{is_plain_decimal, is_signed_integer, is_unsigned_integer};

/// Parent id marking the root sample.
pub const ROOT_PARENT_ID: i64 = -1;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Improper SWC format at line {line} of {file}")]
    Format { file: String, line: usize },

    #[error("No root node found in {file}")]
    NoRoot { file: String },
}

/// One sample point of a reconstruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwcRecord {
    pub id: i64,
    pub node_type: u32,
    pub position: Point3D,
    pub radius: f64,
    pub parent_id: i64,
}

impl SwcRecord {
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_id == ROOT_PARENT_ID
    }
}

/// Parse an SWC file.
///
/// Z coordinates are multiplied by `scale_z` so that XY and Z share units.
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or
/// `ParseError::Format` naming the first malformed line.
pub fn parse_swc_file(path: &Path, scale_z: f64) -> Result<Vec<SwcRecord>, ParseError> {
    let text = std::fs::read_to_string(path)?;
    parse_swc_text(&text, &display_name(path), scale_z)
}

/// Parse SWC content already held in memory. `source` names the input in
/// error messages.
///
/// Blank lines are skipped along with comments.
///
/// # Errors
///
/// Returns `ParseError::Format` for the first line that is neither a
/// comment nor a well formed record.
pub fn parse_swc_text(text: &str, source: &str, scale_z: f64) -> Result<Vec<SwcRecord>, ParseError> {
    let mut records = Vec::new();

    for (index, line) in text.lines().enumerate() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let record = parse_record(line, scale_z).ok_or_else(|| ParseError::Format {
            file: source.to_string(),
            line: index + 1,
        })?;
        records.push(record);
    }

    debug!("Parsed {} SWC records from {}", records.len(), source);
    Ok(records)
}

/// Short name used to identify an input in messages.
#[must_use]
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn parse_record(line: &str, scale_z: f64) -> Option<SwcRecord> {
    let fields: Vec<&str> = line
        .split(|c: char| c == ' ' || c == '\t')
        .filter(|f| !f.is_empty())
        .collect();
    let [id, node_type, x, y, z, radius, parent] = fields.as_slice() else {
        return None;
    };

    if !is_unsigned_integer(id) || !is_unsigned_integer(node_type) || !is_signed_integer(parent) {
        return None;
    }
    if ![x, y, z].iter().all(|c| is_plain_decimal(c, true)) || !is_plain_decimal(radius, false) {
        return None;
    }

    let z: f64 = z.parse().ok()?;
    Some(SwcRecord {
        id: id.parse().ok()?,
        node_type: node_type.parse().ok()?,
        position: Point3D::new(x.parse().ok()?, y.parse().ok()?, z * scale_z),
        radius: radius.parse().ok()?,
        parent_id: parent.parse().ok()?,
    })
}
