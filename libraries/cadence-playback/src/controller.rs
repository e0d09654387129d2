//! Single-stream playback controller
//!
//! The controller is the only owner of the output device. The device sits in a
//! `tokio::sync::Mutex` that a play holds from content resolution through load and
//! start, and that pause, seek and repeat-one restarts take as well. Commands
//! therefore wait for an in-flight play to settle before touching the device.
//!
//! Supersession: every play (and stop) bumps a generation number and cancels the
//! token of the play before it. A play only writes state while its generation is
//! still current, so an older play that settles late can never overwrite what a
//! newer command set. Output reports carry the session (the generation that loaded
//! the content) and are dropped once that session is no longer loaded.

use crate::config::PlayerConfig;
use crate::error::PlaybackFault;
use crate::events::{EventBus, EventSubscription, PlaybackEvent};
use crate::output::{AudioOutput, OutputEvent, OutputEventKind, SessionId};
use crate::source::ContentSource;
use crate::types::{PlaybackState, PlaybackStatus};
use crate::volume::Volume;
use bytes::Bytes;
use cadence_cache::{CachedContent, ContentCache, PinGuard};
use cadence_core::{Song, SongId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// What happened when the loaded song completed
#[derive(Debug, Clone, PartialEq)]
pub enum EndedOutcome {
    /// Status is now `Ended`; the caller decides what plays next
    Finished(Song),

    /// Repeat-one restarted the song from the beginning
    Repeated(Song),
}

impl EndedOutcome {
    pub fn song(&self) -> &Song {
        match self {
            Self::Finished(song) | Self::Repeated(song) => song,
        }
    }
}

#[derive(Debug)]
struct ControllerState {
    snapshot: PlaybackState,
    song: Option<Song>,
    /// Bumped by every play and stop
    generation: u64,
    /// Generation whose content is loaded on the output
    session: Option<SessionId>,
    in_flight: Option<CancellationToken>,
    volume: Volume,
    /// Volume changed while the device was busy
    volume_dirty: bool,
    repeat_one: bool,
    pin: Option<PinGuard>,
    closed: bool,
}

type Emitted = Vec<PlaybackEvent>;

/// Owner of the output device and the playback state machine
pub struct PlaybackController {
    output: tokio::sync::Mutex<Box<dyn AudioOutput>>,
    state: Mutex<ControllerState>,
    cache: Arc<ContentCache>,
    source: Arc<dyn ContentSource>,
    events: EventBus,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state.lock().snapshot)
            .finish_non_exhaustive()
    }
}

impl PlaybackController {
    pub fn new(
        output: Box<dyn AudioOutput>,
        cache: Arc<ContentCache>,
        source: Arc<dyn ContentSource>,
        config: &PlayerConfig,
    ) -> Self {
        let volume = Volume::new(config.volume);
        Self {
            output: tokio::sync::Mutex::new(output),
            state: Mutex::new(ControllerState {
                snapshot: PlaybackState::new(volume.level()),
                song: None,
                generation: 0,
                session: None,
                in_flight: None,
                volume,
                volume_dirty: false,
                repeat_one: false,
                pin: None,
                closed: false,
            }),
            cache,
            source,
            events: EventBus::new(config.event_capacity),
            shutdown: CancellationToken::new(),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> PlaybackState {
        self.state.lock().snapshot.clone()
    }

    /// Song the state refers to, if any
    pub fn current_song(&self) -> Option<Song> {
        self.state.lock().song.clone()
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.events.subscribe()
    }

    pub fn set_repeat_one(&self, enabled: bool) {
        self.state.lock().repeat_one = enabled;
    }

    pub fn repeat_one(&self) -> bool {
        self.state.lock().repeat_one
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().closed
    }

    pub(crate) fn emit(&self, event: PlaybackEvent) {
        self.events.emit(event);
    }

    /// Play `song`, or resume/replay the current one when `None`
    ///
    /// `None` resumes from `Paused`, does nothing while `Loading` or `Playing`, and
    /// replays the current song from `Error` or `Ended`. Returns `Aborted` when a
    /// newer command superseded this one; in that case nothing was written.
    pub async fn play(&self, song: Option<Song>) -> Result<(), PlaybackFault> {
        let result = match song {
            Some(song) => self.load_and_start(song).await,
            None => self.resume_or_replay().await,
        };
        self.flush_volume();
        result
    }

    async fn resume_or_replay(&self) -> Result<(), PlaybackFault> {
        let (status, song, generation) = {
            let state = self.state.lock();
            if state.closed {
                return Err(PlaybackFault::Aborted);
            }
            (state.snapshot.status, state.song.clone(), state.generation)
        };

        match (status, song) {
            (PlaybackStatus::Paused, _) => {
                let mut output = self.output.lock().await;
                let resumed = self.transition(
                    Some(generation),
                    |state, events| -> Result<(), PlaybackFault> {
                        if state.snapshot.status != PlaybackStatus::Paused {
                            return Ok(());
                        }
                        output.resume()?;
                        state.snapshot.status = PlaybackStatus::Playing;
                        events.push(state_changed(state));
                        Ok(())
                    },
                );
                match resumed {
                    Some(Ok(())) => Ok(()),
                    Some(Err(fault)) => {
                        output.stop();
                        self.fail(generation, fault.clone());
                        Err(fault)
                    }
                    None => Err(PlaybackFault::Aborted),
                }
            }
            (PlaybackStatus::Error | PlaybackStatus::Ended, Some(song)) => {
                self.load_and_start(song).await
            }
            _ => Ok(()),
        }
    }

    #[instrument(skip(self, song), fields(song_id = %song.id))]
    async fn load_and_start(&self, song: Song) -> Result<(), PlaybackFault> {
        let (generation, token) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.closed {
                return Err(PlaybackFault::Aborted);
            }

            state.generation += 1;
            let token = self.shutdown.child_token();
            if let Some(previous) = state.in_flight.replace(token.clone()) {
                previous.cancel();
            }

            state.song = Some(song.clone());
            state.session = None;
            state.pin = None;
            state.snapshot.current_song_id = Some(song.id.clone());
            state.snapshot.status = PlaybackStatus::Loading;
            state.snapshot.position = Duration::ZERO;
            state.snapshot.duration = song.duration;
            state.snapshot.last_error = None;

            self.events.emit(state_changed(state));
            self.events.emit(PlaybackEvent::LoadStart {
                song_id: song.id.clone(),
            });
            (state.generation, token)
        };

        debug!(generation, "Play requested");

        // Wait for whatever holds the device to settle
        let output = tokio::select! {
            output = self.output.lock() => Some(output),
            () = token.cancelled() => None,
        };
        let Some(mut output) = output else {
            debug!(generation, "Play superseded while waiting for the output");
            return Err(PlaybackFault::Aborted);
        };
        if token.is_cancelled() {
            return Err(PlaybackFault::Aborted);
        }
        output.stop();

        let content = tokio::select! {
            content = self.resolve(&song) => Some(content),
            () = token.cancelled() => None,
        };
        let content = match content {
            Some(Ok(content)) => content,
            Some(Err(fault)) => {
                self.fail(generation, fault.clone());
                return Err(fault);
            }
            None => return Err(PlaybackFault::Aborted),
        };

        let gain = {
            let mut state = self.state.lock();
            state.volume_dirty = false;
            state.volume.gain()
        };
        let loaded = tokio::select! {
            loaded = output.load(generation, content, gain) => Some(loaded),
            () = token.cancelled() => None,
        };
        let info = match loaded {
            Some(Ok(info)) => info,
            Some(Err(fault)) => {
                output.stop();
                self.fail(generation, fault.clone());
                return Err(fault);
            }
            None => {
                output.stop();
                return Err(PlaybackFault::Aborted);
            }
        };

        let ready = self.transition(Some(generation), |state, events| {
            state.session = Some(generation);
            if let Some(duration) = info.duration.filter(|duration| !duration.is_zero()) {
                state.snapshot.duration = duration;
                events.push(PlaybackEvent::DurationKnown { duration });
            }
            events.push(PlaybackEvent::ReadyToPlay {
                song_id: song.id.clone(),
            });
        });
        if ready.is_none() {
            output.stop();
            return Err(PlaybackFault::Aborted);
        }

        let started = tokio::select! {
            started = output.start() => Some(started),
            () = token.cancelled() => None,
        };
        match started {
            Some(Ok(())) => {}
            Some(Err(fault)) => {
                output.stop();
                self.fail(generation, fault.clone());
                return Err(fault);
            }
            None => {
                output.stop();
                return Err(PlaybackFault::Aborted);
            }
        }

        let pin = self.cache.pin(&song.id);
        let playing = self.transition(Some(generation), |state, events| {
            state.snapshot.status = PlaybackStatus::Playing;
            state.pin = pin;
            state.in_flight = None;
            events.push(state_changed(state));
        });
        if playing.is_none() {
            output.stop();
            return Err(PlaybackFault::Aborted);
        }

        info!(generation, title = %song.title, "Playback started");
        Ok(())
    }

    /// Cache, then inline bytes, then the content source
    async fn resolve(&self, song: &Song) -> Result<Bytes, PlaybackFault> {
        if let Some(cached) = self.cached(&song.id).await {
            debug!(song_id = %song.id, "Content cache hit");
            return Ok(cached.audio);
        }

        if let Some(bytes) = song.content_ref.inline_bytes() {
            debug!(song_id = %song.id, community = song.is_community(), "Using inline content");
            return Ok(bytes.clone());
        }

        let bytes = self.source.fetch(&song.content_ref, None).await?;
        let content = CachedContent::audio(bytes.clone()).with_metadata(song.metadata());
        self.populate(song.id.clone(), content).await;
        Ok(bytes)
    }

    /// Cache lookup; disk-backed caches are read on the blocking pool
    async fn cached(&self, id: &SongId) -> Option<CachedContent> {
        if !self.cache.blocks_on_io() {
            return self.cache.get(id);
        }

        let cache = Arc::clone(&self.cache);
        let id = id.clone();
        match tokio::task::spawn_blocking(move || cache.get(&id)).await {
            Ok(cached) => cached,
            Err(err) => {
                warn!(error = %err, "Cache lookup task failed");
                None
            }
        }
    }

    async fn populate(&self, id: SongId, content: CachedContent) {
        let cache = Arc::clone(&self.cache);
        let key = id.clone();
        let put = move || cache.put(key, &content);

        let result = if self.cache.blocks_on_io() {
            match tokio::task::spawn_blocking(put).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(song_id = %id, error = %err, "Cache write task failed");
                    return;
                }
            }
        } else {
            put()
        };

        match result {
            Ok(report) if !report.is_clean() => {
                warn!(
                    song_id = %id,
                    failures = report.failures.len(),
                    "Eviction after caching finished with failures"
                );
            }
            Ok(_) => {}
            Err(fault) => {
                warn!(song_id = %id, error = %fault, "Could not cache fetched content");
            }
        }
    }

    /// Pause; only meaningful from `Playing`
    ///
    /// Returns whether the controller paused.
    pub async fn pause(&self) -> bool {
        let paused = {
            let mut output = self.output.lock().await;
            self.transition(None, |state, events| {
                if state.snapshot.status != PlaybackStatus::Playing {
                    return false;
                }
                output.pause();
                state.snapshot.status = PlaybackStatus::Paused;
                events.push(state_changed(state));
                true
            })
            .unwrap_or(false)
        };
        self.flush_volume();
        paused
    }

    /// Seek to `seconds`
    ///
    /// Ignored (returns `false`) when not finite, negative, past the known duration,
    /// or when nothing is loaded.
    pub async fn seek(&self, seconds: f64) -> bool {
        if !seconds.is_finite() || seconds < 0.0 {
            debug!(seconds, "Rejected seek");
            return false;
        }
        match Duration::try_from_secs_f64(seconds) {
            Ok(position) => self.seek_to(position).await,
            Err(_) => {
                debug!(seconds, "Rejected seek");
                false
            }
        }
    }

    /// Seek to `position`; see [`seek`](Self::seek)
    pub async fn seek_to(&self, position: Duration) -> bool {
        let sought = {
            let mut output = self.output.lock().await;
            self.transition(None, |state, events| -> Result<bool, PlaybackFault> {
                if !state.snapshot.status.is_loaded() {
                    return Ok(false);
                }
                let duration = state.snapshot.duration;
                if !duration.is_zero() && position > duration {
                    return Ok(false);
                }
                output.seek(position)?;
                state.snapshot.position = position;
                events.push(PlaybackEvent::TimeProgress { position, duration });
                Ok(true)
            })
        };

        let sought = match sought {
            Some(Ok(sought)) => sought,
            Some(Err(fault)) => {
                warn!(error = %fault, "Output rejected seek");
                false
            }
            None => false,
        };
        self.flush_volume();
        sought
    }

    /// Set volume, clamped into `[0, 1]`; returns the stored value
    ///
    /// Applied to the output right away when the device is free, otherwise as soon
    /// as the current holder releases it.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let level = {
            let mut state = self.state.lock();
            let level = state.volume.set_level(volume);
            state.snapshot.volume = level;
            state.volume_dirty = true;
            self.events.emit(PlaybackEvent::VolumeChanged { volume: level });
            level
        };
        self.flush_volume();
        level
    }

    /// Push a pending volume change to the output if the device is free
    fn flush_volume(&self) {
        if !self.state.lock().volume_dirty {
            return;
        }
        if let Ok(mut output) = self.output.try_lock() {
            let gain = {
                let mut state = self.state.lock();
                state.volume_dirty = false;
                state.volume.gain()
            };
            output.set_volume(gain);
        }
    }

    /// Stop playback and return to `Idle`
    ///
    /// Supersedes any in-flight play.
    pub async fn stop(&self) {
        let generation = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.generation += 1;
            if let Some(token) = state.in_flight.take() {
                token.cancel();
            }
            state.generation
        };

        {
            let mut output = self.output.lock().await;
            self.transition(Some(generation), |state, events| {
                output.stop();
                state.song = None;
                state.session = None;
                state.pin = None;
                state.snapshot.current_song_id = None;
                state.snapshot.status = PlaybackStatus::Idle;
                state.snapshot.position = Duration::ZERO;
                state.snapshot.duration = Duration::ZERO;
                events.push(state_changed(state));
            });
        }
        self.flush_volume();
    }

    /// Apply a report from the output device
    ///
    /// Reports from sessions that are no longer loaded are dropped. On natural
    /// completion, repeat-one restarts the song here; otherwise the status becomes
    /// `Ended` and the outcome tells the caller which song finished.
    pub async fn handle_output_event(&self, event: OutputEvent) -> Option<EndedOutcome> {
        let session = event.session;
        match event.kind {
            OutputEventKind::Progress { position, duration } => {
                self.transition_session(session, |state, events| {
                    if state.snapshot.status != PlaybackStatus::Playing {
                        return;
                    }
                    if !duration.is_zero() && state.snapshot.duration != duration {
                        state.snapshot.duration = duration;
                        events.push(PlaybackEvent::DurationKnown { duration });
                    }
                    state.snapshot.position = position;
                    events.push(PlaybackEvent::TimeProgress {
                        position,
                        duration: state.snapshot.duration,
                    });
                });
                None
            }
            OutputEventKind::Ended => self.on_ended(session).await,
            OutputEventKind::Fault(fault) => {
                let mut output = self.output.lock().await;
                let generation = self.transition_session(session, |state, _| state.generation);
                if let Some(generation) = generation {
                    warn!(session, error = %fault, "Output fault during playback");
                    output.stop();
                    self.fail(generation, fault);
                }
                None
            }
        }
    }

    async fn on_ended(&self, session: SessionId) -> Option<EndedOutcome> {
        let (song, repeat_one) = self
            .transition_session(session, |state, _| {
                (state.snapshot.status == PlaybackStatus::Playing)
                    .then(|| state.song.clone().map(|song| (song, state.repeat_one)))
                    .flatten()
            })
            .flatten()?;

        if repeat_one {
            let mut output = self.output.lock().await;
            // A pause or a new play may have landed while waiting for the device
            let still_playing = self
                .transition_session(session, |state, _| {
                    state.snapshot.status == PlaybackStatus::Playing
                })
                .unwrap_or(false);
            if !still_playing {
                return None;
            }

            let result = match output.seek(Duration::ZERO) {
                Ok(()) => output.start().await,
                Err(fault) => Err(fault),
            };
            return match result {
                Ok(()) => {
                    self.transition_session(session, |state, events| {
                        state.snapshot.position = Duration::ZERO;
                        events.push(PlaybackEvent::TimeProgress {
                            position: Duration::ZERO,
                            duration: state.snapshot.duration,
                        });
                    })?;
                    debug!(song_id = %song.id, "Repeating song");
                    Some(EndedOutcome::Repeated(song))
                }
                Err(fault) => {
                    output.stop();
                    if let Some(generation) =
                        self.transition_session(session, |state, _| state.generation)
                    {
                        self.fail(generation, fault);
                    }
                    None
                }
            };
        }

        self.transition_session(session, |state, events| {
            state.snapshot.status = PlaybackStatus::Ended;
            if !state.snapshot.duration.is_zero() {
                state.snapshot.position = state.snapshot.duration;
            }
            events.push(state_changed(state));
            events.push(PlaybackEvent::Ended {
                song_id: song.id.clone(),
            });
        })?;

        debug!(song_id = %song.id, "Song ended");
        Some(EndedOutcome::Finished(song))
    }

    /// Cancel in-flight work, release the output and close every subscription
    ///
    /// Idempotent.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.generation += 1;
            state.in_flight = None;
        }
        self.shutdown.cancel();

        let mut output = self.output.lock().await;
        output.release();
        drop(output);

        {
            let mut state = self.state.lock();
            state.pin = None;
            state.session = None;
            if state.snapshot.status.is_loaded() || state.snapshot.status == PlaybackStatus::Loading
            {
                state.snapshot.status = PlaybackStatus::Idle;
            }
            self.events.emit(state_changed(&state));
        }
        self.events.close();
        info!("Playback controller shut down");
    }

    /// Record a fault for `generation` if it is still current
    fn fail(&self, generation: u64, fault: PlaybackFault) {
        let failed = self.transition(Some(generation), |state, events| {
            state.snapshot.status = PlaybackStatus::Error;
            state.snapshot.last_error = Some(fault.kind());
            state.session = None;
            state.pin = None;
            state.in_flight = None;
            events.push(state_changed(state));
            events.push(PlaybackEvent::Error {
                song_id: state.snapshot.current_song_id.clone(),
                kind: fault.kind(),
                message: fault.to_string(),
            });
        });
        if failed.is_some() {
            warn!(generation, error = %fault, "Playback failed");
        }
    }

    /// Run `apply` under the state lock, then emit what it produced
    ///
    /// With `Some(generation)` nothing runs unless that generation is current.
    /// Nothing runs after shutdown.
    fn transition<R>(
        &self,
        generation: Option<u64>,
        apply: impl FnOnce(&mut ControllerState, &mut Emitted) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock();
        if state.closed || generation.is_some_and(|generation| generation != state.generation) {
            return None;
        }

        let mut events = Vec::new();
        let result = apply(&mut state, &mut events);
        for event in events {
            self.events.emit(event);
        }
        Some(result)
    }

    /// Like `transition`, gated on `session` being the loaded one
    fn transition_session<R>(
        &self,
        session: SessionId,
        apply: impl FnOnce(&mut ControllerState, &mut Emitted) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock();
        if state.closed || state.session != Some(session) {
            debug!(session, loaded = ?state.session, "Dropping stale output event");
            return None;
        }

        let mut events = Vec::new();
        let result = apply(&mut state, &mut events);
        for event in events {
            self.events.emit(event);
        }
        Some(result)
    }
}

fn state_changed(state: &ControllerState) -> PlaybackEvent {
    PlaybackEvent::StateChanged {
        status: state.snapshot.status,
        song_id: state.snapshot.current_song_id.clone(),
    }
}
