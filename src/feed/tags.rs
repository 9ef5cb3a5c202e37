use lofty::prelude::{Accessor, TaggedFileExt};
use lofty::probe::Probe;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("Failed to open audio file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read tags: {0}")]
    Lofty(#[from] lofty::error::LoftyError),
}

/// Reads embedded metadata from an audio file.
///
/// Only the artist is consumed: the feed uses it as each episode's
/// description and summary.
pub trait TagReader: Send + Sync {
    /// Returns the artist tag, or `None` when the file has no such tag.
    fn artist(&self, path: &Path) -> Result<Option<String>, TagError>;
}

/// Tag reader backed by `lofty`, covering ID3v2/v1, MP4, Vorbis and APE tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn artist(&self, path: &Path) -> Result<Option<String>, TagError> {
        let tagged_file = Probe::open(path)?.guess_file_type()?.read()?;
        let tag = tagged_file.primary_tag().or(tagged_file.first_tag());
        Ok(tag.and_then(|t| t.artist().map(|s| s.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_error() {
        let result = LoftyTagReader.artist(Path::new("/tmp/podserve_tags_test_missing.mp3"));
        assert!(result.is_err());
    }

    #[test]
    fn test_garbage_file_yields_no_artist() {
        let dir = std::env::temp_dir().join("podserve_tags_test_garbage");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("noise.mp3");
        std::fs::write(&path, b"this is not an mpeg stream").unwrap();

        assert!(!matches!(LoftyTagReader.artist(&path), Ok(Some(_))));

        std::fs::remove_dir_all(&dir).ok();
    }
}
