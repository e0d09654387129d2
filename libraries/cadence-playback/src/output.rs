//! Audio output device
//!
//! The controller owns exactly one [`AudioOutput`]. Loading and starting are async;
//! transport commands are sync. Outputs report progress, natural completion and
//! faults on an mpsc channel, tagged with the load session they belong to so the
//! controller can drop reports from songs it has already moved past.

use crate::error::PlaybackFault;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Identifies one `load` on an output
pub type SessionId = u64;

/// Report from the output device
#[derive(Debug, Clone, PartialEq)]
pub struct OutputEvent {
    pub session: SessionId,
    pub kind: OutputEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputEventKind {
    /// Periodic position; `duration` is zero when unknown
    Progress { position: Duration, duration: Duration },

    /// Content completed naturally
    Ended,

    /// Playback failed after it started
    Fault(PlaybackFault),
}

pub type OutputEventSender = mpsc::UnboundedSender<OutputEvent>;
pub type OutputEventReceiver = mpsc::UnboundedReceiver<OutputEvent>;

/// Channel an output reports on
pub fn output_channel() -> (OutputEventSender, OutputEventReceiver) {
    mpsc::unbounded_channel()
}

/// What the output learned while loading
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MediaInfo {
    pub duration: Option<Duration>,
    pub sample_rate: Option<u32>,
    pub channels: Option<usize>,
}

/// The single exclusive output device
#[async_trait]
pub trait AudioOutput: Send {
    /// Load content as `session`, replacing whatever was loaded
    async fn load(
        &mut self,
        session: SessionId,
        content: Bytes,
        gain: f32,
    ) -> Result<MediaInfo, PlaybackFault>;

    /// Start producing audio for the loaded content
    async fn start(&mut self) -> Result<(), PlaybackFault>;

    fn pause(&mut self);

    fn resume(&mut self) -> Result<(), PlaybackFault>;

    fn seek(&mut self, position: Duration) -> Result<(), PlaybackFault>;

    fn set_volume(&mut self, gain: f32);

    /// Stop and unload
    fn stop(&mut self);

    /// Stop and give the device up; later loads fail with `ResourceUnavailable`
    fn release(&mut self);
}

/// Probe encoded audio with symphonia
///
/// Unknown containers are `UnsupportedFormat`; a recognized container whose codec
/// cannot be decoded is `DecodeFailure`.
pub fn probe(content: &Bytes) -> Result<MediaInfo, PlaybackFault> {
    let source = Box::new(Cursor::new(content.to_vec())) as Box<dyn MediaSource>;
    let stream = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| PlaybackFault::UnsupportedFormat(err.to_string()))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PlaybackFault::UnsupportedFormat("No audio track".to_string()))?;

    symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| PlaybackFault::DecodeFailure(err.to_string()))?;

    let params = &track.codec_params;
    let duration = match (params.n_frames, params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => {
            Some(Duration::from_secs_f64(frames as f64 / f64::from(rate)))
        }
        _ => None,
    };

    Ok(MediaInfo {
        duration,
        sample_rate: params.sample_rate,
        channels: params.channels.map(|channels| channels.count()),
    })
}

/// Position clock that runs in real (tokio) time while playing
#[derive(Debug, Clone, Copy)]
struct Clock {
    playing: bool,
    base: Duration,
    since: Instant,
}

impl Clock {
    fn new() -> Self {
        Self {
            playing: false,
            base: Duration::ZERO,
            since: Instant::now(),
        }
    }

    fn position(&self, now: Instant) -> Duration {
        if self.playing {
            self.base + now.saturating_duration_since(self.since)
        } else {
            self.base
        }
    }

    fn play(&mut self, now: Instant) {
        if !self.playing {
            self.since = now;
            self.playing = true;
        }
    }

    fn pause(&mut self, now: Instant) {
        self.base = self.position(now);
        self.playing = false;
    }

    fn seek(&mut self, position: Duration, now: Instant) {
        self.base = position;
        self.since = now;
    }
}

#[derive(Debug, Clone, Copy)]
struct Loaded {
    session: SessionId,
    duration: Option<Duration>,
}

/// Output that decodes nothing and keeps time
///
/// Content is probed with symphonia so format and decode faults surface exactly as
/// on a real device. While playing, a tick task reports progress every `tick` and
/// reports `Ended` once the probed duration has elapsed.
#[derive(Debug)]
pub struct VirtualOutput {
    events: OutputEventSender,
    tick: Duration,
    loaded: Option<Loaded>,
    clock: Arc<Mutex<Clock>>,
    ticker: Option<CancellationToken>,
    gain: f32,
    released: bool,
}

impl VirtualOutput {
    pub fn new(events: OutputEventSender) -> Self {
        Self::with_tick(events, Duration::from_millis(250))
    }

    pub fn with_tick(events: OutputEventSender, tick: Duration) -> Self {
        Self {
            events,
            tick: tick.max(Duration::from_millis(1)),
            loaded: None,
            clock: Arc::new(Mutex::new(Clock::new())),
            ticker: None,
            gain: 1.0,
            released: false,
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn position(&self) -> Duration {
        self.clock.lock().position(Instant::now())
    }

    fn ensure_available(&self) -> Result<(), PlaybackFault> {
        if self.released {
            Err(PlaybackFault::ResourceUnavailable(
                "Output has been released".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(token) = self.ticker.take() {
            token.cancel();
        }
    }

    fn spawn_ticker(&mut self, loaded: Loaded) {
        self.stop_ticker();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let clock = Arc::clone(&self.clock);
        let events = self.events.clone();
        let tick = self.tick;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        let position = clock.lock().position(Instant::now());
                        let kind = match loaded.duration {
                            Some(duration) if position >= duration => {
                                let mut clock = clock.lock();
                                clock.pause(Instant::now());
                                clock.base = duration;
                                OutputEventKind::Ended
                            }
                            duration => OutputEventKind::Progress {
                                position,
                                duration: duration.unwrap_or_default(),
                            },
                        };

                        let ended = kind == OutputEventKind::Ended;
                        trace!(session = loaded.session, ?kind, "Virtual output tick");
                        if events.send(OutputEvent { session: loaded.session, kind }).is_err() {
                            debug!("Output event receiver dropped, stopping ticker");
                            break;
                        }
                        if ended {
                            break;
                        }
                    }
                }
            }
        });

        self.ticker = Some(token);
    }
}

#[async_trait]
impl AudioOutput for VirtualOutput {
    async fn load(
        &mut self,
        session: SessionId,
        content: Bytes,
        gain: f32,
    ) -> Result<MediaInfo, PlaybackFault> {
        self.ensure_available()?;
        self.stop();

        let info = probe(&content)?;
        self.loaded = Some(Loaded {
            session,
            duration: info.duration,
        });
        self.gain = gain;

        debug!(session, bytes = content.len(), duration = ?info.duration, "Virtual output loaded");
        Ok(info)
    }

    async fn start(&mut self) -> Result<(), PlaybackFault> {
        self.resume()
    }

    fn pause(&mut self) {
        self.stop_ticker();
        self.clock.lock().pause(Instant::now());
    }

    fn resume(&mut self) -> Result<(), PlaybackFault> {
        self.ensure_available()?;
        let loaded = self.loaded.ok_or_else(|| {
            PlaybackFault::ResourceUnavailable("Nothing loaded".to_string())
        })?;

        self.clock.lock().play(Instant::now());
        self.spawn_ticker(loaded);
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<(), PlaybackFault> {
        self.ensure_available()?;
        if self.loaded.is_none() {
            return Err(PlaybackFault::ResourceUnavailable(
                "Nothing loaded".to_string(),
            ));
        }
        self.clock.lock().seek(position, Instant::now());
        Ok(())
    }

    fn set_volume(&mut self, gain: f32) {
        self.gain = gain;
    }

    fn stop(&mut self) {
        self.stop_ticker();
        self.loaded = None;
        *self.clock.lock() = Clock::new();
    }

    fn release(&mut self) {
        if !self.released {
            self.stop();
            self.released = true;
            debug!("Virtual output released");
        }
    }
}

impl Drop for VirtualOutput {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mono 16-bit WAV of `secs` seconds at 8 kHz
    fn wav(secs: u32) -> Bytes {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..(8000 * secs) {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        Bytes::from(cursor.into_inner())
    }

    #[test]
    fn probe_reads_wav_duration() {
        let info = probe(&wav(2)).unwrap();
        assert_eq!(info.duration, Some(Duration::from_secs(2)));
        assert_eq!(info.sample_rate, Some(8000));
        assert_eq!(info.channels, Some(1));
    }

    #[test]
    fn probe_rejects_garbage() {
        let err = probe(&Bytes::from_static(b"definitely not audio")).unwrap_err();
        assert!(matches!(err, PlaybackFault::UnsupportedFormat(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn virtual_output_reports_progress_then_ended() {
        let (tx, mut rx) = output_channel();
        let mut output = VirtualOutput::with_tick(tx, Duration::from_millis(500));

        output.load(7, wav(1), 1.0).await.unwrap();
        output.start().await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.session, 7);
        assert!(matches!(first.kind, OutputEventKind::Progress { .. }));

        let mut last = first;
        while last.kind != OutputEventKind::Ended {
            last = rx.recv().await.unwrap();
        }
        assert_eq!(output.position(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_position() {
        let (tx, _rx) = output_channel();
        let mut output = VirtualOutput::new(tx);

        output.load(1, wav(5), 1.0).await.unwrap();
        output.start().await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        output.pause();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(output.position(), Duration::from_secs(2));

        output.seek(Duration::from_millis(500)).unwrap();
        assert_eq!(output.position(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn released_output_refuses_work() {
        let (tx, _rx) = output_channel();
        let mut output = VirtualOutput::new(tx);
        output.release();

        let err = output.load(1, wav(1), 1.0).await.unwrap_err();
        assert!(matches!(err, PlaybackFault::ResourceUnavailable(_)));
    }
}
