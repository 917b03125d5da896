//! Receiver worker
//!
//! Negotiates the session (SETUP then PLAY), launches the receive
//! pipeline, and then serves a small stdin command loop standing in for
//! the player's transport buttons: `play`, `pause`, `stats`, `teardown`.

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;

use crate::config::ReceiverConfig;
use crate::media::{FileSink, NullSink, PlaybackSink};
use crate::pipeline::SessionSignals;
use crate::pipeline::receiver::ReceiverCoordinator;
use crate::session::{ControlClient, SessionState};

pub async fn run(config: ReceiverConfig, signals: SessionSignals) -> Result<()> {
    let socket = UdpSocket::bind(("0.0.0.0", config.data_port))
        .await
        .with_context(|| format!("binding data port {}", config.data_port))?;

    let control_addr = format!("{}:{}", config.server_host, config.control_port);
    let mut control = ControlClient::connect(&control_addr, &config.resource).await?;
    control.setup(config.data_port).await?;

    let sink: Box<dyn PlaybackSink> = match &config.output_dir {
        Some(dir) => Box::new(FileSink::create(dir.clone())?),
        None => Box::new(NullSink),
    };

    let mut coordinator = ReceiverCoordinator::new(&config, signals.clone());
    coordinator.launch(&config, Arc::new(socket), sink)?;

    control.play().await?;
    coordinator.resume();
    info!("playing; commands: play, pause, stats, teardown");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = signals.cancelled() => break,
            line = stdin.next_line() => line.context("reading command")?,
        };
        let Some(line) = line else { break };

        match line.trim() {
            "play" => {
                if control.state() == SessionState::Ready {
                    control.play().await?;
                    coordinator.resume();
                }
            }
            "pause" => {
                if control.state() == SessionState::Playing {
                    control.pause().await?;
                    coordinator.pause();
                }
            }
            "stats" => {
                let (video, audio) = coordinator.stats();
                println!("video: {video}");
                println!("audio: {audio}");
            }
            "teardown" | "quit" => break,
            "" => {}
            other => println!("unknown command {other:?}; commands: play, pause, stats, teardown"),
        }
    }

    // Best effort: the channel may already be gone
    if let Err(e) = control.teardown().await {
        info!("teardown not acknowledged: {e:#}");
    }
    coordinator.shutdown().await;

    let (video, audio) = coordinator.stats();
    info!("final video stats: {video}");
    info!("final audio stats: {audio}");
    Ok(())
}
