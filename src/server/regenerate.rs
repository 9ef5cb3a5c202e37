//! Periodic feed regeneration.
//!
//! One long-lived task rebuilds the feed on a fixed interval and publishes
//! the result to the shared slot. The build itself is blocking work (a
//! directory scan plus one external process per new file), so it runs on
//! tokio's blocking pool and never stalls request handling.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::slot::FeedPublisher;
use crate::config::Podcast;
use crate::feed::{BuildError, FeedBuilder, RenderedFeed};

#[derive(Debug, Error)]
pub enum RegenerateError {
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The blocking build task panicked or was cancelled.
    #[error("Feed build task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Rebuilds the feed and publishes it to the shared slot.
pub struct Regenerator {
    builder: Arc<FeedBuilder>,
    directory: PathBuf,
    podcast: Arc<Podcast>,
    publisher: FeedPublisher,
}

impl Regenerator {
    pub fn new(
        builder: Arc<FeedBuilder>,
        directory: PathBuf,
        podcast: Arc<Podcast>,
        publisher: FeedPublisher,
    ) -> Self {
        Self {
            builder,
            directory,
            podcast,
            publisher,
        }
    }

    /// Runs one regeneration cycle.
    ///
    /// On success the new document replaces the published one. On failure
    /// the previously published document stays in place.
    pub async fn regenerate(&self) -> Result<usize, RegenerateError> {
        let builder = Arc::clone(&self.builder);
        let directory = self.directory.clone();
        let podcast = Arc::clone(&self.podcast);

        let started = std::time::Instant::now();
        let RenderedFeed {
            xml, episode_count, ..
        } = tokio::task::spawn_blocking(move || {
            builder.build_at(&directory, &podcast, chrono::Utc::now())
        })
        .await??;

        self.publisher.publish(xml);
        tracing::info!(
            episodes = episode_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Feed regenerated"
        );
        Ok(episode_count)
    }

    /// Spawns the regeneration loop.
    ///
    /// The first cycle runs one `period` after spawning; callers wanting an
    /// immediate build call [`Regenerator::regenerate`] first. A failed
    /// cycle is logged and the loop waits for the next tick. The loop exits
    /// when `shutdown` is cancelled.
    pub fn spawn(self, period: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            // A slow build delays the next one instead of triggering a burst
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {
                        tracing::info!("Feed regeneration stopped");
                        break;
                    }

                    _ = ticker.tick() => {
                        if let Err(e) = self.regenerate().await {
                            tracing::warn!(
                                dir = %self.directory.display(),
                                error = %e,
                                "Feed regeneration failed, keeping previous document"
                            );
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{AudioMatcher, DurationProbe, ProbeError, TagError, TagReader};
    use crate::server::slot::{feed_slot, FeedReader};
    use crate::util::validate_base_url;
    use std::path::Path;

    struct NoProbe;

    impl DurationProbe for NoProbe {
        fn probe(&self, _path: &Path) -> Result<String, ProbeError> {
            Err(ProbeError::NoDuration)
        }
    }

    struct NoTags;

    impl TagReader for NoTags {
        fn artist(&self, _path: &Path) -> Result<Option<String>, TagError> {
            Ok(None)
        }
    }

    fn podcast() -> Arc<Podcast> {
        Arc::new(Podcast {
            base_url: validate_base_url("http://localhost:8000/").unwrap(),
            title: "T".to_string(),
            description: "D".to_string(),
            image: "I".to_string(),
            author: "A".to_string(),
            email: String::new(),
            summary: "D".to_string(),
            language: "en".to_string(),
            episode_author: "A".to_string(),
        })
    }

    fn builder() -> Arc<FeedBuilder> {
        Arc::new(FeedBuilder::new(
            AudioMatcher::default(),
            Box::new(NoProbe),
            Box::new(NoTags),
        ))
    }

    fn text(reader: &FeedReader) -> String {
        String::from_utf8(reader.current().to_vec()).unwrap()
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("podserve_regenerate_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_regenerate_publishes() {
        let dir = test_dir("publish");
        std::fs::write(dir.join("a.mp3"), "x").unwrap();

        let (publisher, reader) = feed_slot("placeholder".to_string());
        let regen = Regenerator::new(builder(), dir.clone(), podcast(), publisher);

        assert_eq!(regen.regenerate().await.unwrap(), 1);
        assert!(text(&reader).contains("a.mp3"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_failed_regenerate_keeps_previous() {
        let dir = test_dir("keep");
        std::fs::write(dir.join("a.mp3"), "x").unwrap();

        let (publisher, reader) = feed_slot("placeholder".to_string());
        let regen = Regenerator::new(builder(), dir.clone(), podcast(), publisher);
        regen.regenerate().await.unwrap();
        let before = reader.current();

        std::fs::remove_dir_all(&dir).unwrap();
        let err = regen.regenerate().await.unwrap_err();
        assert!(matches!(
            err,
            RegenerateError::Build(BuildError::DirectoryUnavailable { .. })
        ));
        assert_eq!(reader.current(), before);
    }

    #[tokio::test]
    async fn test_loop_picks_up_new_files() {
        let dir = test_dir("loop");
        let (publisher, mut reader) = feed_slot("placeholder".to_string());
        let regen = Regenerator::new(builder(), dir.clone(), podcast(), publisher);
        regen.regenerate().await.unwrap();
        assert_eq!(text(&reader).matches("<item>").count(), 0);

        let token = CancellationToken::new();
        let handle = regen.spawn(Duration::from_millis(20), token.clone());

        std::fs::write(dir.join("new.mp3"), "x").unwrap();
        let found = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if !reader.changed().await {
                    return false;
                }
                if text(&reader).contains("new.mp3") {
                    return true;
                }
            }
        })
        .await
        .unwrap();
        assert!(found);

        token.cancel();
        handle.await.unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_loop_survives_failures_and_stops_on_cancel() {
        let dir = PathBuf::from("/tmp/podserve_regenerate_test_never_exists");
        let (publisher, reader) = feed_slot("placeholder".to_string());
        let regen = Regenerator::new(builder(), dir, podcast(), publisher);

        let token = CancellationToken::new();
        let handle = regen.spawn(Duration::from_millis(10), token.clone());
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!handle.is_finished());
        assert_eq!(reader.current(), "placeholder");

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
