//! Arena Client - headless driver for the client simulation core
//!
//! Connects to the arena server, joins under the configured name, and feeds
//! console commands into the session:
//! - `press <key>` / `release <key>` for movement (WASD or arrow names)
//! - `aim <x> <y>` to fire at a scene point, `click <x> <y>` for a viewport point
//! - `quit` to leave

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arena_client_core::config::Config;
use arena_client_core::game::input::{viewport_to_scene, Command, InputEvent};
use arena_client_core::game::{ClientSession, ConnectionPhase, SessionHandle, Vec2};
use arena_client_core::ws::{self, Connection};

/// Size of the view the console `click` command is relative to
const VIEWPORT: Vec2 = Vec2::new(800.0, 600.0);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    info!("Starting Arena Client");

    let tiles = Arc::new(config.build_tile_map()?);
    info!(
        cols = tiles.cols(),
        rows = tiles.rows(),
        width = tiles.width(),
        height = tiles.height(),
        "Arena map ready"
    );

    let Connection {
        channel,
        inbound_rx,
        reader,
        writer,
    } = ws::connect(&config.server_url).await?;

    let (session, handle) = ClientSession::new(tiles, config.tuning, channel, inbound_rx);
    let session_task = tokio::spawn(session.run());
    let console_task = tokio::spawn(console_loop(handle.clone()));

    tokio::select! {
        _ = watch_view(handle.clone(), config.player_name.clone(), config.character.clone()) => {}
        _ = shutdown_signal() => handle.shutdown(),
    }

    session_task.await?;
    console_task.abort();
    reader.abort();
    let _ = writer.await;

    info!("Client shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Follow published views: join once connected, report roster changes, and
/// return when the session ends.
async fn watch_view(handle: SessionHandle, name: String, character: Option<String>) {
    let mut view_rx = handle.view_rx.clone();
    let mut roster_version = 0;
    let mut join_sent = false;

    loop {
        let view = Arc::clone(&view_rx.borrow_and_update());

        match view.phase {
            ConnectionPhase::Joined if !join_sent => {
                handle.send(InputEvent::Join {
                    name: name.clone(),
                    character: character.clone(),
                });
                join_sent = true;
            }
            ConnectionPhase::Disconnected => {
                info!("Session disconnected");
                return;
            }
            _ => {}
        }

        if view.roster_version != roster_version {
            roster_version = view.roster_version;
            info!(
                players = view.others.len(),
                remote_projectiles = view.remote_projectiles.len(),
                "Roster updated"
            );
        }

        if view_rx.changed().await.is_err() {
            return;
        }
    }
}

/// Read console commands from stdin until EOF
async fn console_loop(handle: SessionHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Console closed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read console");
                return;
            }
        };

        match Command::parse(&line) {
            Some(Command::Input(input)) => handle.send(input),
            Some(Command::Click(click)) => {
                let view = handle.view();
                match view.self_state.as_ref() {
                    Some(me) => handle.send(InputEvent::Aim(viewport_to_scene(
                        me.position,
                        VIEWPORT,
                        click,
                    ))),
                    None => debug!("Click before joining, ignoring"),
                }
            }
            None if line.trim().is_empty() => {}
            None => warn!(line = %line.trim(), "Unrecognised command"),
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, leaving arena");
        }
        _ = terminate => {
            info!("Received terminate signal, leaving arena");
        }
    }
}
