//! Player facade
//!
//! Glues queue selection to the playback controller and the content cache. Queue
//! operations run under a `parking_lot` lock that is never held across an await;
//! every await goes through the controller, which serializes device access.

use crate::config::PlayerConfig;
use crate::controller::{EndedOutcome, PlaybackController};
use crate::error::{PlayerError, Result};
use crate::events::{EventSubscription, PlaybackEvent};
use crate::output::{AudioOutput, OutputEvent, OutputEventReceiver};
use crate::queue::{QueueManager, QueueSnapshot};
use crate::sink::{notify, PlaybackSink, SinkNotice};
use crate::source::{ContentSource, SourceRouter};
use crate::types::{InsertPosition, PlaybackState, PlaybackStatus, RepeatMode};
use cadence_cache::{spawn_cleanup, ContentCache};
use cadence_core::Song;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Builder for [`Player`]
pub struct PlayerBuilder {
    config: PlayerConfig,
    cache: Option<Arc<ContentCache>>,
    source: Option<Arc<dyn ContentSource>>,
    sink: Option<Arc<dyn PlaybackSink>>,
}

impl PlayerBuilder {
    /// Share an existing cache instead of creating one from the config
    pub fn cache(mut self, cache: Arc<ContentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn PlaybackSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the player around the one output device
    pub fn build(self, output: Box<dyn AudioOutput>) -> Player {
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(ContentCache::new(self.config.cache.clone())));
        let source = self
            .source
            .unwrap_or_else(|| Arc::new(SourceRouter::with_defaults()));
        let controller = Arc::new(PlaybackController::new(
            output,
            Arc::clone(&cache),
            source,
            &self.config,
        ));

        Player {
            queue: Mutex::new(QueueManager::new(
                self.config.history_size,
                self.config.shuffle_seed,
            )),
            controller,
            cursor_ahead: AtomicBool::new(false),
            cache,
            sink: self.sink,
            tasks: CancellationToken::new(),
            restart_threshold: self.config.restart_threshold(),
        }
    }
}

/// Orchestration facade exposed to the UI layer
pub struct Player {
    controller: Arc<PlaybackController>,
    queue: Mutex<QueueManager>,
    /// The playing song was removed and the cursor already sits on its follower
    cursor_ahead: AtomicBool,
    cache: Arc<ContentCache>,
    sink: Option<Arc<dyn PlaybackSink>>,
    tasks: CancellationToken,
    restart_threshold: Duration,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("controller", &self.controller)
            .field("queue_len", &self.queue.lock().len())
            .finish_non_exhaustive()
    }
}

impl Player {
    pub fn builder(config: PlayerConfig) -> PlayerBuilder {
        PlayerBuilder {
            config,
            cache: None,
            source: None,
            sink: None,
        }
    }

    /// Play `song`, or continue with what is current
    ///
    /// A given song that is already queued becomes current; otherwise it is
    /// inserted right after the current one. Without a song, an idle controller
    /// starts the queue's current song, and any other status is handed to the
    /// controller (resume when paused, replay after an error or the end).
    pub async fn play(&self, song: Option<Song>) -> Result<()> {
        match song {
            Some(song) => {
                let (song, index) = {
                    let mut queue = self.queue.lock();
                    let index = match queue.position_of(&song.id) {
                        Some(index) => index,
                        None => queue.add_to_queue(song, InsertPosition::Next),
                    };
                    self.cursor_ahead.store(false, Ordering::Release);
                    (queue.jump_to(index)?.clone(), index)
                };
                self.emit_queue_changed();
                self.start_song(song, Some(index)).await
            }
            None if self.controller.current_song().is_none() => {
                let (song, index) = {
                    let queue = self.queue.lock();
                    let song = queue.current().cloned().ok_or(PlayerError::NothingToPlay)?;
                    self.cursor_ahead.store(false, Ordering::Release);
                    (song, queue.current_index())
                };
                self.start_song(song, index).await
            }
            None => {
                self.controller.play(None).await?;
                Ok(())
            }
        }
    }

    async fn start_song(&self, song: Song, index: Option<usize>) -> Result<()> {
        let previous_song_id = self.controller.current_song().map(|current| current.id);
        self.controller.emit(PlaybackEvent::TrackChanged {
            song_id: song.id.clone(),
            previous_song_id,
            index,
        });

        self.controller.play(Some(song.clone())).await?;
        if let Some(sink) = &self.sink {
            notify(sink, SinkNotice::Started, song);
        }
        Ok(())
    }

    pub async fn pause(&self) -> bool {
        self.controller.pause().await
    }

    pub async fn seek(&self, seconds: f64) -> bool {
        self.controller.seek(seconds).await
    }

    pub fn set_volume(&self, volume: f32) -> f32 {
        self.controller.set_volume(volume)
    }

    pub async fn stop(&self) {
        self.controller.stop().await;
    }

    pub fn toggle_shuffle(&self) -> bool {
        let enabled = self.queue.lock().toggle_shuffle();
        self.emit_mode_changed();
        enabled
    }

    /// Rotate repeat mode; repeat-one is handed to the controller
    pub fn cycle_repeat(&self) -> RepeatMode {
        let mode = self.queue.lock().cycle_repeat();
        self.controller.set_repeat_one(mode == RepeatMode::One);
        self.emit_mode_changed();
        mode
    }

    pub fn set_repeat(&self, mode: RepeatMode) {
        self.queue.lock().set_repeat(mode);
        self.controller.set_repeat_one(mode == RepeatMode::One);
        self.emit_mode_changed();
    }

    pub fn add_to_queue(&self, song: Song, position: InsertPosition) -> usize {
        let index = self.queue.lock().add_to_queue(song, position);
        self.emit_queue_changed();
        index
    }

    /// Remove the song at `index`
    ///
    /// Removing the song that is playing lets it finish; the song that took its
    /// place at the cursor plays next.
    pub fn remove_from_queue(&self, index: usize) -> Result<Song> {
        let removed = {
            let mut queue = self.queue.lock();
            let was_current = queue.current_index() == Some(index);
            let removed = queue.remove_from_queue(index)?;

            if was_current {
                let playing = self
                    .controller
                    .current_song()
                    .is_some_and(|song| song.id == removed.id);
                if playing || self.cursor_ahead.load(Ordering::Acquire) {
                    // Without a follower the cursor falls back one and plain advancing applies
                    self.cursor_ahead.store(index < queue.len(), Ordering::Release);
                }
            }
            removed
        };
        self.emit_queue_changed();
        Ok(removed)
    }

    pub fn set_queue(&self, songs: Vec<Song>, start: usize) -> Option<usize> {
        self.cursor_ahead.store(false, Ordering::Release);
        let current = self.queue.lock().set_queue(songs, start);
        self.emit_queue_changed();
        current
    }

    /// Skip to the next song
    ///
    /// Returns the song now playing, or `None` when the queue is exhausted.
    pub async fn next(&self) -> Result<Option<Song>> {
        let Some((song, index)) = self.select_next()? else {
            debug!("No next song");
            return Ok(None);
        };
        self.emit_queue_changed();
        self.start_song(song.clone(), Some(index)).await?;
        Ok(Some(song))
    }

    /// Restart the current song when past the threshold, else go back one
    pub async fn previous(&self) -> Result<Option<Song>> {
        let state = self.controller.state();
        if state.status.is_loaded()
            && state.position > self.restart_threshold
            && self.controller.seek_to(Duration::ZERO).await
        {
            return Ok(self.controller.current_song());
        }

        let previous = {
            let mut queue = self.queue.lock();
            self.cursor_ahead.store(false, Ordering::Release);
            queue
                .retreat()?
                .and_then(|index| queue.get(index).cloned().map(|song| (song, index)))
        };

        let Some((song, index)) = previous else {
            return Ok(None);
        };
        self.emit_queue_changed();
        self.start_song(song.clone(), Some(index)).await?;
        Ok(Some(song))
    }

    /// Play the current song again, typically after an error
    pub async fn retry(&self) -> Result<()> {
        let song = self
            .controller
            .current_song()
            .or_else(|| self.queue.lock().current().cloned())
            .ok_or(PlayerError::NothingToPlay)?;
        let index = self.queue.lock().position_of(&song.id);
        self.start_song(song, index).await
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.controller.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn queue_snapshot(&self) -> QueueSnapshot {
        self.queue.lock().snapshot()
    }

    /// Up to `n` songs that would play next
    pub fn peek_upcoming(&self, n: usize) -> Vec<Song> {
        self.queue.lock().peek_upcoming(n).cloned().collect()
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn controller(&self) -> &Arc<PlaybackController> {
        &self.controller
    }

    /// Route one output report through the controller and react to completion
    ///
    /// On natural completion the queue advances and the next song starts; when the
    /// queue is exhausted the status stays `Ended` and the cursor does not move.
    pub async fn handle_output_event(&self, event: OutputEvent) {
        let Some(outcome) = self.controller.handle_output_event(event).await else {
            return;
        };

        if let Some(sink) = &self.sink {
            notify(sink, SinkNotice::Counted, outcome.song().clone());
        }

        if matches!(outcome, EndedOutcome::Repeated(_)) {
            return;
        }

        let next = match self.select_next() {
            Ok(next) => next,
            Err(err) => {
                debug!(error = %err, "Nothing to advance to");
                None
            }
        };

        match next {
            Some((song, index)) => {
                self.emit_queue_changed();
                if let Err(err) = self.start_song(song, Some(index)).await {
                    warn!(error = %err, "Could not start next song");
                }
            }
            None => {
                info!("Queue finished");
                self.controller.emit(PlaybackEvent::QueueFinished {
                    song_id: outcome.song().id.clone(),
                });
            }
        }
    }

    /// The song to move to after the current one, moving the cursor
    fn select_next(&self) -> Result<Option<(Song, usize)>> {
        let mut queue = self.queue.lock();
        let next = if self.cursor_ahead.swap(false, Ordering::AcqRel) {
            queue.current_index()
        } else {
            queue.advance()?
        };
        Ok(next.and_then(|index| queue.get(index).cloned().map(|song| (song, index))))
    }

    /// Process output reports in arrival order until shutdown
    pub fn spawn_event_loop(self: &Arc<Self>, mut receiver: OutputEventReceiver) -> JoinHandle<()> {
        let player = Arc::clone(self);
        let cancelled = self.tasks.child_token();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    event = receiver.recv() => match event {
                        Some(event) => player.handle_output_event(event).await,
                        None => break,
                    },
                }
            }
            debug!("Output event loop stopped");
        })
    }

    /// Periodic cache eviction until shutdown
    pub fn spawn_cache_cleanup(&self) -> JoinHandle<()> {
        spawn_cleanup(Arc::clone(&self.cache), self.tasks.child_token())
    }

    /// Stop background tasks, release the output and close subscriptions
    pub async fn shutdown(&self) {
        self.tasks.cancel();
        self.controller.shutdown().await;
    }

    pub fn is_playing(&self) -> bool {
        self.controller.state().status == PlaybackStatus::Playing
    }

    fn emit_queue_changed(&self) {
        let (length, current_index) = {
            let queue = self.queue.lock();
            (queue.len(), queue.current_index())
        };
        self.controller.emit(PlaybackEvent::QueueChanged {
            length,
            current_index,
        });
    }

    fn emit_mode_changed(&self) {
        let (shuffle_enabled, repeat_mode) = {
            let queue = self.queue.lock();
            (queue.shuffle_enabled(), queue.repeat_mode())
        };
        self.controller.emit(PlaybackEvent::ModeChanged {
            shuffle_enabled,
            repeat_mode,
        });
    }
}
