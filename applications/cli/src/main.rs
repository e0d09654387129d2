//! Cadence - command-line music player

mod config;
mod library;

use crate::config::CliConfig;
use anyhow::Context;
use bytes::Bytes;
use cadence_cache::{ContentCache, DiskStore};
use cadence_playback::{
    output_channel, probe, PlaybackEvent, Player, RepeatMode, SourceRouter, TracingSink,
    VirtualOutput,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Play local music through the Cadence playback engine", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./cadence.toml when present)
    #[arg(short, long, global = true, env = "CADENCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play files and directories as one queue
    Play {
        /// Audio files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Pick each next song at random
        #[arg(long)]
        shuffle: bool,

        /// Repeat mode
        #[arg(long, value_enum, default_value_t = RepeatArg::Off)]
        repeat: RepeatArg,

        /// Initial volume in [0, 1]
        #[arg(long)]
        volume: Option<f32>,

        /// Queue index to start from
        #[arg(long, default_value_t = 0)]
        start: usize,
    },
    /// Print format information for an audio file
    Probe {
        /// Audio file
        path: PathBuf,
    },
    /// List the playable songs found under the given paths
    Scan {
        /// Audio files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RepeatArg {
    Off,
    One,
    All,
}

impl From<RepeatArg> for RepeatMode {
    fn from(value: RepeatArg) -> Self {
        match value {
            RepeatArg::Off => RepeatMode::Off,
            RepeatArg::One => RepeatMode::One,
            RepeatArg::All => RepeatMode::All,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence=info,cadence_playback=info,cadence_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            paths,
            shuffle,
            repeat,
            volume,
            start,
        } => {
            let config = CliConfig::load(cli.config.as_deref())?;
            play(config, paths, shuffle, repeat.into(), volume, start).await?;
        }
        Commands::Probe { path } => {
            probe_file(path).await?;
        }
        Commands::Scan { paths } => {
            let songs = scan(paths).await?;
            for (index, song) in songs.iter().enumerate() {
                println!(
                    "{:>3}  {:<40}  {:>6.1}s",
                    index,
                    song.title,
                    song.duration.as_secs_f64()
                );
            }
            println!("{} songs", songs.len());
        }
    }

    Ok(())
}

async fn scan(paths: Vec<PathBuf>) -> anyhow::Result<Vec<cadence_core::Song>> {
    tokio::task::spawn_blocking(move || library::scan(&paths))
        .await
        .context("Library scan panicked")?
}

async fn probe_file(path: PathBuf) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let info = probe(&Bytes::from(bytes))?;

    println!("file:        {}", path.display());
    match info.duration {
        Some(duration) => println!("duration:    {:.2}s", duration.as_secs_f64()),
        None => println!("duration:    unknown"),
    }
    if let Some(rate) = info.sample_rate {
        println!("sample rate: {rate} Hz");
    }
    if let Some(channels) = info.channels {
        println!("channels:    {channels}");
    }
    Ok(())
}

fn build_cache(config: &CliConfig) -> anyhow::Result<Arc<ContentCache>> {
    let cache_config = config.player.cache.clone();
    let cache = match &config.cache_dir {
        Some(dir) => {
            let store = DiskStore::open(dir)
                .with_context(|| format!("Failed to open cache directory {}", dir.display()))?;
            info!(dir = %dir.display(), "Using disk cache");
            ContentCache::with_store(cache_config, Arc::new(store))
        }
        None => ContentCache::new(cache_config),
    };
    Ok(Arc::new(cache))
}

async fn play(
    config: CliConfig,
    paths: Vec<PathBuf>,
    shuffle: bool,
    repeat: RepeatMode,
    volume: Option<f32>,
    start: usize,
) -> anyhow::Result<()> {
    let songs = scan(paths).await?;
    if songs.is_empty() {
        anyhow::bail!("No playable audio found");
    }
    info!(songs = songs.len(), "Library scanned");

    let mut player_config = config.player.clone();
    if let Some(volume) = volume {
        player_config = player_config.with_volume(volume);
    }

    let (events, receiver) = output_channel();
    let output = VirtualOutput::with_tick(events, Duration::from_millis(config.tick_ms));
    let player = Arc::new(
        Player::builder(player_config)
            .cache(build_cache(&config)?)
            .source(Arc::new(SourceRouter::with_defaults()))
            .sink(Arc::new(TracingSink))
            .build(Box::new(output)),
    );

    let event_loop = player.spawn_event_loop(receiver);
    let cleanup = player.spawn_cache_cleanup();
    let mut subscription = player.subscribe();

    player.set_queue(songs, start);
    if shuffle {
        player.toggle_shuffle();
    }
    player.set_repeat(repeat);

    if let Err(err) = player.play(None).await {
        warn!(error = %err, "Could not start playback");
    }

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for ctrl-c")?;
                info!("Interrupted");
                break;
            }
            event = subscription.recv() => match event {
                Some(event) => {
                    if !on_event(&player, event).await {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    player.shutdown().await;
    if let Err(err) = event_loop.await {
        warn!(error = %err, "Event loop task failed");
    }
    if let Err(err) = cleanup.await {
        warn!(error = %err, "Cache cleanup task failed");
    }

    let stats = player.cache().stats();
    info!(
        entries = stats.count,
        bytes = stats.total_size,
        hit_rate = stats.hit_rate(),
        evictions = stats.evictions,
        "Cache statistics"
    );
    Ok(())
}

/// React to one player event; `false` ends the session
async fn on_event(player: &Player, event: PlaybackEvent) -> bool {
    match event {
        PlaybackEvent::TrackChanged { song_id, index, .. } => {
            info!(song_id = %song_id, ?index, "Track changed");
        }
        PlaybackEvent::QueueFinished { song_id } => {
            info!(song_id = %song_id, "Queue finished");
            return false;
        }
        PlaybackEvent::Error {
            song_id, message, ..
        } => {
            warn!(song_id = ?song_id, %message, "Skipping song");
            match player.next().await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    info!("Nothing left to play");
                    return false;
                }
                Err(err) => {
                    warn!(error = %err, "Could not skip ahead");
                    return false;
                }
            }
        }
        PlaybackEvent::TimeProgress { position, duration } => {
            debug!(
                position = position.as_secs(),
                duration = duration.as_secs(),
                "Progress"
            );
        }
        other => debug!(event = ?other, "Player event"),
    }
    true
}
