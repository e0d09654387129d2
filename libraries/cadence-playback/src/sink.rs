//! History and metrics sink
//!
//! The player reports when a song starts and when it is played through. Delivery
//! is fire-and-forget: each call runs on its own task, and failures are logged and
//! never reach playback.

use async_trait::async_trait;
use cadence_core::Song;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Error reported by a sink
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Sink failure: {0}")]
pub struct SinkError(pub String);

/// Receiver of play notifications
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// A song reached `Playing`
    async fn song_started(&self, song: &Song) -> Result<(), SinkError>;

    /// A song completed naturally
    async fn play_counted(&self, song: &Song) -> Result<(), SinkError>;
}

/// Sink that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl PlaybackSink for TracingSink {
    async fn song_started(&self, song: &Song) -> Result<(), SinkError> {
        info!(song_id = %song.id, title = %song.title, artist = %song.artist, "Now playing");
        Ok(())
    }

    async fn play_counted(&self, song: &Song) -> Result<(), SinkError> {
        info!(song_id = %song.id, "Play counted");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum SinkNotice {
    Started,
    Counted,
}

/// Deliver a notice on a separate task
pub(crate) fn notify(sink: &Arc<dyn PlaybackSink>, notice: SinkNotice, song: Song) {
    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        let result = match notice {
            SinkNotice::Started => sink.song_started(&song).await,
            SinkNotice::Counted => sink.play_counted(&song).await,
        };
        if let Err(err) = result {
            warn!(song_id = %song.id, ?notice, error = %err, "Playback sink failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FailingSink {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl PlaybackSink for FailingSink {
        async fn song_started(&self, _song: &Song) -> Result<(), SinkError> {
            *self.calls.lock() += 1;
            Err(SinkError("offline".to_string()))
        }

        async fn play_counted(&self, _song: &Song) -> Result<(), SinkError> {
            *self.calls.lock() += 1;
            Err(SinkError("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let failing = Arc::new(FailingSink::default());
        let sink: Arc<dyn PlaybackSink> = failing.clone();
        let song = Song::builder("a", "A").build();

        notify(&sink, SinkNotice::Started, song.clone());
        notify(&sink, SinkNotice::Counted, song);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(*failing.calls.lock(), 2);
    }
}
