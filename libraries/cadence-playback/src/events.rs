//! Playback events
//!
//! Events go out on a `tokio::sync::broadcast` channel. Every subscriber gets its
//! own [`EventSubscription`]; slow subscribers skip what they missed instead of
//! blocking the controller. Closing the bus (on shutdown) ends every subscription:
//! `recv` returns `None` once buffered events are drained.

use crate::error::FaultKind;
use crate::types::{PlaybackStatus, RepeatMode};
use cadence_core::SongId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{trace, warn};

/// Events emitted by the controller and the player facade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Status changed
    StateChanged {
        status: PlaybackStatus,
        song_id: Option<SongId>,
    },

    /// Periodic position update
    TimeProgress {
        position: Duration,
        duration: Duration,
    },

    /// The output learned the length of the loaded song
    DurationKnown { duration: Duration },

    /// Content resolution started for a song
    LoadStart { song_id: SongId },

    /// Output loaded the song and is about to start
    ReadyToPlay { song_id: SongId },

    /// A play failed
    Error {
        song_id: Option<SongId>,
        kind: FaultKind,
        message: String,
    },

    /// Song completed naturally
    Ended { song_id: SongId },

    /// Volume changed (clamped value)
    VolumeChanged { volume: f32 },

    /// The facade moved to another song
    TrackChanged {
        song_id: SongId,
        previous_song_id: Option<SongId>,
        index: Option<usize>,
    },

    /// Items or cursor of the queue changed
    QueueChanged {
        length: usize,
        current_index: Option<usize>,
    },

    /// The last song ended and the queue has nothing left to play
    QueueFinished { song_id: SongId },

    /// Shuffle or repeat changed
    ModeChanged {
        shuffle_enabled: bool,
        repeat_mode: RepeatMode,
    },
}

/// Broadcast bus that can be closed exactly once
#[derive(Debug)]
pub(crate) struct EventBus {
    sender: Mutex<Option<broadcast::Sender<PlaybackEvent>>>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Publish to current subscribers; no subscribers is fine
    pub(crate) fn emit(&self, event: PlaybackEvent) {
        if let Some(sender) = self.sender.lock().as_ref() {
            trace!(?event, "Emitting playback event");
            let _ = sender.send(event);
        }
    }

    pub(crate) fn subscribe(&self) -> EventSubscription {
        let receiver = match self.sender.lock().as_ref() {
            Some(sender) => sender.subscribe(),
            // Already closed: hand out a subscription that ends immediately
            None => broadcast::channel(1).1,
        };
        EventSubscription { receiver }
    }

    /// Drop the sender so every subscription ends
    pub(crate) fn close(&self) {
        self.sender.lock().take();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }
}

/// One subscriber's view of the event stream
#[derive(Debug)]
pub struct EventSubscription {
    receiver: broadcast::Receiver<PlaybackEvent>,
}

impl EventSubscription {
    /// Next event, or `None` once the player has shut down
    ///
    /// Events missed because this subscriber fell behind are skipped.
    pub async fn recv(&mut self) -> Option<PlaybackEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged, skipping missed events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next buffered event without waiting
    pub fn try_recv(&mut self) -> Option<PlaybackEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged, skipping missed events");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Every event currently buffered
    pub fn drain(&mut self) -> Vec<PlaybackEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(PlaybackEvent::VolumeChanged { volume: 0.5 });

        assert_eq!(
            a.recv().await,
            Some(PlaybackEvent::VolumeChanged { volume: 0.5 })
        );
        assert_eq!(
            b.try_recv(),
            Some(PlaybackEvent::VolumeChanged { volume: 0.5 })
        );
    }

    #[tokio::test]
    async fn close_ends_subscriptions() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe();

        bus.emit(PlaybackEvent::DurationKnown {
            duration: Duration::from_secs(1),
        });
        bus.close();

        // Buffered events are still delivered
        assert!(sub.recv().await.is_some());
        assert_eq!(sub.recv().await, None);
        assert!(bus.is_closed());

        let mut late = bus.subscribe();
        assert_eq!(late.recv().await, None);
    }

    #[tokio::test]
    async fn lagged_subscriber_skips_ahead() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5u8 {
            bus.emit(PlaybackEvent::VolumeChanged {
                volume: f32::from(i) / 10.0,
            });
        }

        let drained = sub.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(
            drained.last(),
            Some(&PlaybackEvent::VolumeChanged { volume: 0.4 })
        );
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_string(&PlaybackEvent::Ended {
            song_id: SongId::new("a"),
        })
        .unwrap();
        assert_eq!(json, r#"{"event":"Ended","song_id":"a"}"#);
    }
}
