use chrono::{DateTime, Utc};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Selects the audio files a directory scan publishes.
///
/// Exactly one extension is matched, case-sensitively: with the default
/// `mp3`, `show.mp3` is an episode and `show.MP3` is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioMatcher {
    extension: String,
}

impl AudioMatcher {
    /// Creates a matcher for `extension`, given with or without the leading dot.
    pub fn new(extension: impl Into<String>) -> Self {
        let extension = extension.into();
        let extension = extension
            .strip_prefix('.')
            .map(str::to_string)
            .unwrap_or(extension);
        Self { extension }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Returns true if the path's extension is exactly the configured one.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension().and_then(OsStr::to_str) == Some(self.extension.as_str())
    }
}

impl Default for AudioMatcher {
    fn default() -> Self {
        Self::new("mp3")
    }
}

/// An audio file found by a directory scan, before probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFile {
    pub path: PathBuf,
    /// Full file name, used for the episode URL.
    pub file_name: String,
    /// File name without extension, used as the episode title.
    pub stem: String,
    pub size: u64,
    pub modified: SystemTime,
}

/// One feed item, derived from an [`AudioFile`] on every build.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub title: String,
    /// Artist tag, rendered as the item description and summary.
    pub artist: String,
    /// Public URL of the audio file; doubles as the item's guid.
    pub url: String,
    pub size: u64,
    /// Playback length as `HH:MM:SS`.
    pub duration: String,
    pub published: DateTime<Utc>,
}

/// Lists the audio files in `dir`, newest first.
///
/// Only the top level of the directory is scanned. Entries whose metadata
/// cannot be read, whose names are not valid UTF-8, or which are not
/// regular files are skipped with a warning; they never fail the scan.
/// Symlinks are followed only when their target stays inside `dir`, the
/// same containment rule the download handler applies.
///
/// Ordering is by modification time, newest first, with ties broken by
/// file name so repeated scans of an unchanged directory agree.
///
/// # Errors
///
/// Returns the I/O error if the directory itself cannot be read.
pub fn scan_directory(dir: &Path, matcher: &AudioMatcher) -> std::io::Result<Vec<AudioFile>> {
    let root = std::fs::canonicalize(dir)?;
    let mut files = Vec::new();

    for entry in std::fs::read_dir(&root)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to read directory entry");
                continue;
            }
        };
        let path = entry.path();
        if !matcher.matches(&path) {
            continue;
        }

        let (Some(file_name), Some(stem)) = (
            path.file_name().and_then(OsStr::to_str),
            path.file_stem().and_then(OsStr::to_str),
        ) else {
            tracing::warn!(path = %path.display(), "Skipping file with non UTF-8 name");
            continue;
        };

        if entry.file_type().is_ok_and(|t| t.is_symlink()) && !resolves_inside(&path, &root) {
            tracing::warn!(path = %path.display(), "Skipping symlink that leaves the audio directory");
            continue;
        }

        let metadata = match std::fs::metadata(&path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read file metadata");
                continue;
            }
        };
        let modified = match metadata.modified() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Modification time unavailable");
                SystemTime::UNIX_EPOCH
            }
        };

        files.push(AudioFile {
            file_name: file_name.to_string(),
            stem: stem.to_string(),
            size: metadata.len(),
            modified,
            path,
        });
    }

    files.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
    Ok(files)
}

fn resolves_inside(path: &Path, root: &Path) -> bool {
    std::fs::canonicalize(path).is_ok_and(|target| target.starts_with(root))
}
