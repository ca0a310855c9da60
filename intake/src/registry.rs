use core::error::EtlError;
use core::source_spec::SourceSpec;

/// Matches inbound filenames against the configured `SourceSpec`s.
///
/// Grounded on the original's `SourceRegistry.find_source_for_file`, but
/// implements the three-way semantics the original never actually got
/// right (its final `raise` fires unconditionally, even for zero or one
/// match): no match is a skip, exactly one match proceeds, more than one
/// match is a hard configuration error.
pub struct SourceRegistry {
    sources: Vec<SourceSpec>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<SourceSpec>) -> Self {
        SourceRegistry { sources }
    }

    pub fn sources(&self) -> &[SourceSpec] {
        &self.sources
    }

    /// `Ok(None)` - no source matches, caller should skip the file with a
    /// warning and no Run Log entry. `Ok(Some(spec))` - exactly one match.
    /// `Err(AmbiguousSource)` - more than one match, a configuration defect
    /// that must be fixed before this file can be processed.
    pub fn find_source_for_file(&self, filename: &str) -> Result<Option<&SourceSpec>, EtlError> {
        let matches: Vec<&SourceSpec> = self.sources.iter().filter(|s| s.matches_file(filename)).collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches[0])),
            _ => Err(EtlError::AmbiguousSource {
                filename: filename.to_string(),
                candidates: matches.iter().map(|s| s.name().to_string()).collect(),
            }),
        }
    }
}
