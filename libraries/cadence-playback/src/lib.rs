//! Cadence - Playback
//!
//! Queue selection, single-stream playback control and the player facade.
//!
//! This crate provides:
//! - Queue navigation (shuffle, repeat Off/One/All, bounded history, upcoming preview)
//! - A playback controller that owns the one output device and serializes commands
//! - Content resolution through the content cache, inline bytes or a content source
//! - Pinning of the playing song's cache entry
//! - Events for state, time, errors and queue changes
//!
//! # Architecture
//!
//! The output device and the content source are traits. [`VirtualOutput`] keeps
//! time without producing sound and is what tests and the CLI use;
//! [`FileContentSource`] and (with the `http` feature) `HttpContentSource` fetch
//! bytes.
//!
//! # Example
//!
//! ```rust,no_run
//! use cadence_core::{ContentRef, Song};
//! use cadence_playback::{output_channel, Player, PlayerConfig, VirtualOutput};
//! use std::sync::Arc;
//!
//! # async fn example() -> cadence_playback::Result<()> {
//! let (events, receiver) = output_channel();
//! let player = Arc::new(Player::builder(PlayerConfig::default()).build(Box::new(VirtualOutput::new(events))));
//! let _loop = player.spawn_event_loop(receiver);
//!
//! player.set_queue(
//!     vec![Song::builder("a", "Intro")
//!         .content(ContentRef::file("/music/intro.wav"))
//!         .build()],
//!     0,
//! );
//! player.play(None).await?;
//! player.set_volume(0.5);
//! player.pause().await;
//! player.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod controller;
mod error;
mod events;
mod history;
mod output;
mod player;
mod queue;
mod shuffle;
mod sink;
mod source;
pub mod types;
mod volume;

pub use config::PlayerConfig;
pub use controller::{EndedOutcome, PlaybackController};
pub use error::{FaultKind, PlaybackFault, PlayerError, QueueFault, QueueResult, Result};
pub use events::{EventSubscription, PlaybackEvent};
pub use history::History;
pub use output::{
    output_channel, probe, AudioOutput, MediaInfo, OutputEvent, OutputEventKind,
    OutputEventReceiver, OutputEventSender, SessionId, VirtualOutput,
};
pub use player::{Player, PlayerBuilder};
pub use queue::{QueueManager, QueueSnapshot, Upcoming};
pub use sink::{PlaybackSink, SinkError, TracingSink};
#[cfg(feature = "http")]
pub use source::HttpContentSource;
pub use source::{ContentSource, FileContentSource, SourceRouter};
pub use types::{InsertPosition, PlaybackState, PlaybackStatus, RepeatMode};
pub use volume::Volume;
