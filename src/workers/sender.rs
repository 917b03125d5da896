//! Sender worker
//!
//! Accepts one control client and maps its committed transitions onto the
//! pipeline: SETUP builds it (gated shut), PLAY opens the gate, PAUSE
//! closes it, TEARDOWN shuts everything down.

use anyhow::Result;
use log::{info, warn};

use crate::config::SenderConfig;
use crate::pipeline::SessionSignals;
use crate::pipeline::sender::SenderCoordinator;
use crate::session::{ControlServer, ServerEvent};

pub async fn run(config: SenderConfig, signals: SessionSignals) -> Result<()> {
    let mut control = ControlServer::accept(config.control_port).await?;
    let mut coordinator: Option<SenderCoordinator> = None;

    loop {
        let event = tokio::select! {
            _ = signals.cancelled() => break,
            event = control.next_event() => match event {
                Ok(event) => event,
                Err(e) => {
                    warn!("control channel lost: {e:#}");
                    break;
                }
            },
        };

        match event {
            ServerEvent::Setup { client_port } => {
                let mut built = SenderCoordinator::new(signals.clone());
                built
                    .launch(&config, control.peer().ip(), client_port)
                    .await?;
                coordinator = Some(built);
            }
            ServerEvent::Play => {
                if let Some(coordinator) = &coordinator {
                    coordinator.resume();
                }
            }
            ServerEvent::Pause => {
                if let Some(coordinator) = &coordinator {
                    coordinator.pause();
                }
            }
            ServerEvent::Teardown => {
                info!("teardown requested by client");
                break;
            }
        }
    }

    if let Some(mut coordinator) = coordinator {
        coordinator.shutdown().await;
    }
    Ok(())
}
