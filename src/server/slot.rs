use axum::body::Bytes;
use tokio::sync::watch;

/// Creates the shared slot holding the currently published feed document.
///
/// The slot is single-writer, multi-reader: the [`FeedPublisher`] half is
/// owned by the regeneration task and the [`FeedReader`] half is cloned
/// into every request handler. Documents are swapped whole, so a reader
/// sees either the previous or the new document, never a mix.
pub fn feed_slot(initial: String) -> (FeedPublisher, FeedReader) {
    let (tx, rx) = watch::channel(Bytes::from(initial));
    (FeedPublisher { tx }, FeedReader { rx })
}

/// Write half of the feed slot.
#[derive(Debug)]
pub struct FeedPublisher {
    tx: watch::Sender<Bytes>,
}

impl FeedPublisher {
    /// Replaces the published document.
    ///
    /// Succeeds even when no reader is currently alive.
    pub fn publish(&self, xml: String) {
        self.tx.send_replace(Bytes::from(xml));
    }

    /// Returns a new reader for this slot.
    pub fn subscribe(&self) -> FeedReader {
        FeedReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read half of the feed slot. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FeedReader {
    rx: watch::Receiver<Bytes>,
}

impl FeedReader {
    /// The document published most recently, as UTF-8 bytes.
    ///
    /// Cloning [`Bytes`] bumps a reference count, so the lock inside the
    /// channel is held only for that and the document is never copied.
    pub fn current(&self) -> Bytes {
        self.rx.borrow().clone()
    }

    /// Waits until a document newer than the last one seen by this reader
    /// is published. Returns `false` once the publisher has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_document_visible() {
        let (_publisher, reader) = feed_slot("<rss/>".to_string());
        assert_eq!(reader.current(), "<rss/>");
    }

    #[test]
    fn test_publish_replaces_for_all_readers() {
        let (publisher, reader) = feed_slot("old".to_string());
        let other = reader.clone();
        let late = publisher.subscribe();

        publisher.publish("new".to_string());

        assert_eq!(reader.current(), "new");
        assert_eq!(other.current(), "new");
        assert_eq!(late.current(), "new");
    }

    #[test]
    fn test_held_document_survives_publish() {
        let (publisher, reader) = feed_slot("first".to_string());
        let held = reader.current();
        publisher.publish("second".to_string());
        assert_eq!(held, "first");
        assert_eq!(reader.current(), "second");
    }

    #[test]
    fn test_publish_without_readers() {
        let (publisher, reader) = feed_slot("a".to_string());
        drop(reader);
        publisher.publish("b".to_string());
        assert_eq!(publisher.subscribe().current(), "b");
    }

    #[test]
    fn test_readers_share_one_buffer() {
        let (publisher, reader) = feed_slot("shared".to_string());
        let a = reader.current();
        let b = publisher.subscribe().current();
        assert_eq!(a.as_ptr(), b.as_ptr());
    }

    #[tokio::test]
    async fn test_changed_wakes_on_publish() {
        let (publisher, mut reader) = feed_slot("a".to_string());
        let waiter = tokio::spawn(async move {
            let changed = reader.changed().await;
            (changed, reader.current())
        });
        tokio::task::yield_now().await;
        publisher.publish("b".to_string());

        let (changed, doc) = waiter.await.unwrap();
        assert!(changed);
        assert_eq!(doc, "b");
    }

    #[tokio::test]
    async fn test_changed_false_after_publisher_dropped() {
        let (publisher, mut reader) = feed_slot("a".to_string());
        drop(publisher);
        assert!(!reader.changed().await);
    }
}
