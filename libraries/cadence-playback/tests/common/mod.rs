//! Shared test helpers: a scripted output device, a recording sink and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use cadence_core::{ContentRef, Song, SongId};
use cadence_playback::{
    AudioOutput, MediaInfo, PlaybackFault, PlaybackSink, SessionId, SinkError,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::Notify;

// ===== Tracing =====

static INIT: Once = Once::new();

/// Route tracing output through the test harness
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("cadence_playback=debug,cadence_cache=debug")
            .with_test_writer()
            .try_init();
    });
}

// ===== Fixtures =====

/// Song whose bytes travel inline
pub fn inline_song(id: &str, secs: u64) -> Song {
    Song::builder(id, format!("Track {id}"))
        .artist("Test Artist")
        .duration(Duration::from_secs(secs))
        .content(ContentRef::inline(vec![0u8; 64]))
        .build()
}

pub fn songs(ids: &[&str]) -> Vec<Song> {
    ids.iter().map(|id| inline_song(id, 180)).collect()
}

/// Mono 16-bit WAV of `secs` seconds at 8 kHz
pub fn wav(secs: u32) -> Bytes {
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

// ===== Scripted output =====

#[derive(Debug, Clone, PartialEq)]
pub enum OutputCall {
    Load { session: SessionId, gain: f32 },
    Start,
    Pause,
    Resume,
    Seek(Duration),
    SetVolume(f32),
    Stop,
    Release,
}

/// What the next `load` does
pub enum LoadStep {
    Ready(MediaInfo),
    Fail(PlaybackFault),
    /// Wait for the notify before succeeding
    Gated(Arc<Notify>, MediaInfo),
}

pub fn media(secs: u64) -> MediaInfo {
    MediaInfo {
        duration: Some(Duration::from_secs(secs)),
        ..MediaInfo::default()
    }
}

/// Test-side handle to a [`ScriptedOutput`]
#[derive(Clone, Default)]
pub struct OutputProbe {
    calls: Arc<Mutex<Vec<OutputCall>>>,
    steps: Arc<Mutex<VecDeque<LoadStep>>>,
    entered: Arc<Notify>,
}

impl OutputProbe {
    pub fn script(&self, step: LoadStep) {
        self.steps.lock().push_back(step);
    }

    pub fn calls(&self) -> Vec<OutputCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Resolves once a `load` has been entered
    pub async fn wait_for_load(&self) {
        self.entered.notified().await;
    }

    pub fn last_session(&self) -> Option<SessionId> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            OutputCall::Load { session, .. } => Some(*session),
            _ => None,
        })
    }

    pub fn count(&self, wanted: &OutputCall) -> usize {
        self.calls.lock().iter().filter(|call| *call == wanted).count()
    }

    pub fn volume_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, OutputCall::SetVolume(_)))
            .count()
    }

    fn record(&self, call: OutputCall) {
        self.calls.lock().push(call);
    }
}

/// Output that follows a script instead of decoding
///
/// Loads without a scripted step succeed with a 10 second duration.
pub struct ScriptedOutput {
    probe: OutputProbe,
    released: bool,
}

/// A scripted output plus the probe that observes it
pub fn scripted_output() -> (Box<dyn AudioOutput>, OutputProbe) {
    let probe = OutputProbe::default();
    let output = ScriptedOutput {
        probe: probe.clone(),
        released: false,
    };
    (Box::new(output), probe)
}

#[async_trait]
impl AudioOutput for ScriptedOutput {
    async fn load(
        &mut self,
        session: SessionId,
        _content: Bytes,
        gain: f32,
    ) -> Result<MediaInfo, PlaybackFault> {
        self.probe.record(OutputCall::Load { session, gain });
        self.probe.entered.notify_one();
        if self.released {
            return Err(PlaybackFault::ResourceUnavailable("released".to_string()));
        }

        let step = self.probe.steps.lock().pop_front();
        match step {
            None => Ok(media(10)),
            Some(LoadStep::Ready(info)) => Ok(info),
            Some(LoadStep::Fail(fault)) => Err(fault),
            Some(LoadStep::Gated(gate, info)) => {
                gate.notified().await;
                Ok(info)
            }
        }
    }

    async fn start(&mut self) -> Result<(), PlaybackFault> {
        self.probe.record(OutputCall::Start);
        Ok(())
    }

    fn pause(&mut self) {
        self.probe.record(OutputCall::Pause);
    }

    fn resume(&mut self) -> Result<(), PlaybackFault> {
        self.probe.record(OutputCall::Resume);
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<(), PlaybackFault> {
        self.probe.record(OutputCall::Seek(position));
        Ok(())
    }

    fn set_volume(&mut self, gain: f32) {
        self.probe.record(OutputCall::SetVolume(gain));
    }

    fn stop(&mut self) {
        self.probe.record(OutputCall::Stop);
    }

    fn release(&mut self) {
        self.released = true;
        self.probe.record(OutputCall::Release);
    }
}

// ===== Recording sink =====

#[derive(Debug, Default)]
pub struct RecordingSink {
    started: Mutex<Vec<SongId>>,
    counted: Mutex<Vec<SongId>>,
}

impl RecordingSink {
    pub fn started(&self) -> Vec<SongId> {
        self.started.lock().clone()
    }

    pub fn counted(&self) -> Vec<SongId> {
        self.counted.lock().clone()
    }
}

#[async_trait]
impl PlaybackSink for RecordingSink {
    async fn song_started(&self, song: &Song) -> Result<(), SinkError> {
        self.started.lock().push(song.id.clone());
        Ok(())
    }

    async fn play_counted(&self, song: &Song) -> Result<(), SinkError> {
        self.counted.lock().push(song.id.clone());
        Ok(())
    }
}

/// Let spawned tasks (sink deliveries, tickers) run
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
