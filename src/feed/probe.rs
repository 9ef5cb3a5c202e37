//! Episode duration probing.
//!
//! Durations come from an external tool (ffmpeg by default) whose
//! diagnostic output contains a `Duration: HH:MM:SS.xx` token. Probing
//! spawns one process per file, so results are cached between builds and
//! only re-probed when a file's size or modification time changes.
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{LazyLock, Mutex};
use std::time::SystemTime;
use thiserror::Error;

use super::episode::AudioFile;

/// Duration rendered when a file cannot be probed.
pub const DEFAULT_DURATION: &str = "00:00:00";

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration:\s*(\d{2,}:\d{2}:\d{2})").expect("duration pattern is valid")
});

#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe program could not be started (missing binary, permissions).
    #[error("Failed to run duration probe '{program}': {source}")]
    Unavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The probe ran but printed no parsable duration.
    #[error("Probe output contains no duration")]
    NoDuration,
}

/// Reports the playback length of an audio file.
///
/// Implementations return the length as `HH:MM:SS`. Callers treat every
/// error as "unknown duration" for that file only.
pub trait DurationProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Result<String, ProbeError>;
}

/// Probes durations by running `ffmpeg -i <file>` and reading its stderr.
///
/// ffmpeg exits non-zero when no output file is given, but it prints the
/// input's stream information (including the duration) first, so the exit
/// status is ignored.
#[derive(Debug, Clone)]
pub struct FfmpegProbe {
    program: String,
}

impl FfmpegProbe {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegProbe {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl DurationProbe for FfmpegProbe {
    fn probe(&self, path: &Path) -> Result<String, ProbeError> {
        let output = Command::new(&self.program)
            .arg("-hide_banner")
            .arg("-nostdin")
            .arg("-i")
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ProbeError::Unavailable {
                program: self.program.clone(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_duration(&stderr).ok_or(ProbeError::NoDuration)
    }
}

/// Extracts `HH:MM:SS` from the first `Duration: HH:MM:SS.xx` token.
///
/// Fractional seconds are truncated, not rounded.
///
/// # Examples
///
/// ```
/// use podserve::feed::parse_duration;
///
/// let out = "Input #0, mp3, from 'a.mp3':\n  Duration: 00:42:07.93, start: 0.025057, bitrate: 128 kb/s";
/// assert_eq!(parse_duration(out).as_deref(), Some("00:42:07"));
/// assert_eq!(parse_duration("Duration: N/A"), None);
/// ```
pub fn parse_duration(output: &str) -> Option<String> {
    DURATION_RE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone)]
struct CachedDuration {
    size: u64,
    modified: SystemTime,
    duration: String,
}

/// Remembers probed durations keyed by path, validated by size and mtime.
///
/// Only successful probes are cached; a failed probe is retried on the
/// next build (ffmpeg may have been installed in the meantime).
pub struct DurationCache {
    entries: Mutex<LruCache<PathBuf, CachedDuration>>,
}

impl DurationCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached duration if the file is unchanged since it was probed.
    pub fn get(&self, file: &AudioFile) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        let lookup = entries.get(&file.path).map(|hit| {
            let unchanged = hit.size == file.size && hit.modified == file.modified;
            (unchanged, hit.duration.clone())
        });
        match lookup {
            Some((true, duration)) => Some(duration),
            Some((false, _)) => {
                entries.pop(&file.path);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, file: &AudioFile, duration: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                file.path.clone(),
                CachedDuration {
                    size: file.size,
                    modified: file.modified,
                    duration: duration.to_string(),
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const FFMPEG_STDERR: &str = "\
Input #0, mp3, from 'completed/Some Article.mp3':
  Metadata:
    artist          : Example Author
  Duration: 01:02:03.45, start: 0.025057, bitrate: 64 kb/s
  Stream #0:0: Audio: mp3, 24000 Hz, mono, fltp, 64 kb/s
At least one output file must be specified
";

    fn audio_file(path: &str, size: u64, modified: SystemTime) -> AudioFile {
        AudioFile {
            path: PathBuf::from(path),
            file_name: path.to_string(),
            stem: path.to_string(),
            size,
            modified,
        }
    }

    #[test]
    fn test_parse_duration_truncates_fraction() {
        assert_eq!(parse_duration(FFMPEG_STDERR).as_deref(), Some("01:02:03"));
    }

    #[test]
    fn test_parse_duration_without_fraction() {
        assert_eq!(
            parse_duration("Duration: 00:00:59, start").as_deref(),
            Some("00:00:59")
        );
    }

    #[test]
    fn test_parse_duration_long_recordings() {
        assert_eq!(
            parse_duration("  Duration: 125:00:01.00,").as_deref(),
            Some("125:00:01")
        );
    }

    #[test]
    fn test_parse_duration_missing() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_duration("no such file or directory"), None);
    }

    #[test]
    fn test_parse_duration_takes_first_token() {
        let out = "Duration: 00:01:00.00\nDuration: 00:02:00.00";
        assert_eq!(parse_duration(out).as_deref(), Some("00:01:00"));
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let probe = FfmpegProbe::new("/nonexistent/podserve-ffmpeg");
        let err = probe.probe(Path::new("/tmp/a.mp3")).unwrap_err();
        assert!(matches!(err, ProbeError::Unavailable { .. }));
    }

    #[test]
    fn test_cache_hit_when_unchanged() {
        let cache = DurationCache::new(NonZeroUsize::new(4).unwrap());
        let now = SystemTime::now();
        let file = audio_file("/a.mp3", 10, now);

        assert!(cache.get(&file).is_none());
        cache.insert(&file, "00:10:00");
        assert_eq!(cache.get(&file).as_deref(), Some("00:10:00"));
    }

    #[test]
    fn test_cache_invalidated_by_change() {
        let cache = DurationCache::new(NonZeroUsize::new(4).unwrap());
        let now = SystemTime::now();
        cache.insert(&audio_file("/a.mp3", 10, now), "00:10:00");

        let resized = audio_file("/a.mp3", 11, now);
        assert!(cache.get(&resized).is_none());
        assert!(cache.is_empty());

        cache.insert(&audio_file("/a.mp3", 10, now), "00:10:00");
        let touched = audio_file("/a.mp3", 10, now + Duration::from_secs(1));
        assert!(cache.get(&touched).is_none());
    }

    #[test]
    fn test_cache_evicts_least_recent() {
        let cache = DurationCache::new(NonZeroUsize::new(2).unwrap());
        let now = SystemTime::now();
        let a = audio_file("/a.mp3", 1, now);
        let b = audio_file("/b.mp3", 1, now);
        let c = audio_file("/c.mp3", 1, now);

        cache.insert(&a, "00:00:01");
        cache.insert(&b, "00:00:02");
        cache.get(&a);
        cache.insert(&c, "00:00:03");

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&c).is_some());
    }
}
