//! Bard Player (bard-player) - Main entry point
//!
//! Dry-run front end for the playback scheduler:
//! - `resolve`: run the resolution backend and print the result as JSON
//! - `play`: drive one guild through the simulated transport, printing the
//!   notices a chat surface would receive

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bard_common::config::{TomlConfig, CONFIG_ENV_VAR};
use bard_common::events::BardEvent;
use bard_common::GuildId;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bard_player::notify::ConsoleSink;
use bard_player::resolver::{Resolver, YtDlpResolver};
use bard_player::transport::{transport_event_channel, ChannelId, SimulatedTransport};
use bard_player::{PlayRequest, PlaybackEngine};

/// Command-line arguments for bard-player
#[derive(Parser, Debug)]
#[command(name = "bard-player")]
#[command(about = "Per-guild playback scheduler for a voice-channel music bot")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a reference and print the result as JSON
    Resolve {
        reference: String,

        /// List playlist entries without resolving them
        #[arg(long)]
        flat: bool,
    },

    /// Queue references in one guild and play them through the simulated transport
    Play {
        #[arg(required = true)]
        references: Vec<String>,

        /// Guild to play in
        #[arg(long, default_value_t = 1)]
        guild: u64,

        /// Voice channel to join
        #[arg(long, default_value_t = 1)]
        channel: u64,

        /// How long each simulated track plays
        #[arg(long, default_value_t = 5)]
        track_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let resolver = Arc::new(YtDlpResolver::new(config.resolver.clone()));

    match args.command {
        Command::Resolve { reference, flat } => resolve(resolver.as_ref(), &reference, flat).await,
        Command::Play {
            references,
            guild,
            channel,
            track_secs,
        } => {
            play(
                config,
                resolver,
                references,
                GuildId(guild),
                ChannelId(channel),
                Duration::from_secs(track_secs),
            )
            .await
        }
    }
}

async fn resolve(resolver: &dyn Resolver, reference: &str, flat: bool) -> Result<()> {
    let json = if flat {
        let entries = resolver
            .resolve_flat_listing(reference)
            .await
            .with_context(|| format!("Failed to list {}", reference))?;
        serde_json::to_string_pretty(&entries)?
    } else {
        let track = resolver
            .resolve_single(reference)
            .await
            .with_context(|| format!("Failed to resolve {}", reference))?;
        serde_json::to_string_pretty(&track)?
    };
    println!("{}", json);
    Ok(())
}

async fn play(
    config: TomlConfig,
    resolver: Arc<YtDlpResolver>,
    references: Vec<String>,
    guild_id: GuildId,
    channel: ChannelId,
    track_duration: Duration,
) -> Result<()> {
    let (events_tx, events_rx) = transport_event_channel();
    let transport = Arc::new(SimulatedTransport::new(track_duration, events_tx));
    let engine = PlaybackEngine::new(config.player, resolver, transport, events_rx);
    engine.start().await;

    let mut events = engine.subscribe_events();
    let sink = Arc::new(ConsoleSink::with_prefix(format!("guild {}", guild_id)));

    let mut accepted = 0;
    for reference in references {
        let request = PlayRequest {
            guild_id,
            reference: reference.clone(),
            voice_channel: Some(channel),
            notifier: sink.clone(),
        };
        match engine.enqueue_from_reference(request).await {
            Ok(outcome) => {
                info!("Accepted {} as {}", reference, outcome.track().title);
                accepted += 1;
            }
            Err(e) => eprintln!("{}: {}", reference, e),
        }
    }
    if accepted == 0 {
        bail!("Nothing could be queued");
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(BardEvent::SessionCleared { guild_id: cleared, reason, .. }) if cleared == guild_id => {
                    info!("Session finished ({})", reason);
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => warn!("Event stream lagged by {} events", missed),
                Err(RecvError::Closed) => break,
            },
            result = signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}
