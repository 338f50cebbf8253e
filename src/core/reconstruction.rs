use std::path::Path;

use tracing::debug;

use crate::core::binary_tree::BinaryTree;
use crate::core::raw_tree::RawTree;
use crate::core::reduce::{ReductionSettings, TreeReducer};
use crate::parsing::swc::{display_name, parse_swc_file, parse_swc_text, ParseError, SwcRecord};

/// One neuron reconstruction: the raw sample tree and its reduced binary
/// form. The raw tree is kept for rosette walks during termination matching.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub source: String,
    pub raw: RawTree,
    pub tree: BinaryTree,
}

impl Reconstruction {
    /// Read and reduce an SWC file.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the file cannot be read, holds a malformed
    /// record, or has no root record.
    pub fn from_file(path: &Path, settings: &ReductionSettings) -> Result<Self, ParseError> {
        let records = parse_swc_file(path, settings.scale_z)?;
        Self::from_records(&records, &display_name(path), settings)
    }

    /// Parse and reduce SWC text. `source` names the input in errors.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` for a malformed record or a missing root.
    pub fn from_swc_text(text: &str, source: &str, settings: &ReductionSettings) -> Result<Self, ParseError> {
        let records = parse_swc_text(text, source, settings.scale_z)?;
        Self::from_records(&records, source, settings)
    }

    /// Build from records already parsed (and Z-scaled).
    ///
    /// # Errors
    ///
    /// Returns `ParseError::NoRoot` if no record has parent id -1.
    pub fn from_records(records: &[SwcRecord], source: &str, settings: &ReductionSettings) -> Result<Self, ParseError> {
        let raw = RawTree::from_records(records, settings.link_policy).ok_or_else(|| ParseError::NoRoot {
            file: source.to_string(),
        })?;
        let tree = TreeReducer::new(*settings).reduce(&raw);
        debug!("{}: {} trees below the soma", source, tree.heads().len());

        Ok(Self {
            source: source.to_string(),
            raw,
            tree,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_root_is_structure_error() {
        let result = Reconstruction::from_swc_text("2 1 0 0 0 1 1\n", "orphan.swc", &ReductionSettings::default());
        match result {
            Err(ParseError::NoRoot { file }) => assert_eq!(file, "orphan.swc"),
            other => panic!("Expected missing root error, got {other:?}"),
        }
        let err = Reconstruction::from_swc_text("", "empty.swc", &ReductionSettings::default()).unwrap_err();
        assert_eq!(err.to_string(), "No root node found in empty.swc");
    }

    #[test]
    fn test_from_file_uses_file_name() {
        let mut file = tempfile::NamedTempFile::with_suffix(".swc").unwrap();
        std::io::Write::write_all(&mut file, b"1 1 0 0 0 1 -1\n2 1 0 5 0 1 1\n").unwrap();

        let recon = Reconstruction::from_file(file.path(), &ReductionSettings::default()).unwrap();
        assert!(recon.source.ends_with(".swc"));
        assert!(!recon.source.contains('/'));
        assert_eq!(recon.tree.heads().len(), 1);
        assert_eq!(recon.raw.len(), 2);
    }
}
