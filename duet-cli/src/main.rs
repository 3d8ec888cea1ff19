use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Select;
use duet_client::{
    ChannelConfig, NoCapture, PeerConnectionState, RejectionReason, RemoteStream,
    RendezvousChannel, RtcPeerConnector, SessionConfig, SessionObserver, spawn_session,
};
use duet_core::{ConnectionId, PersistentId, Role, RoomSnapshot, SessionId};
use duet_server::CoordinatorConfig;
use std::io::IsTerminal;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "duet")]
#[command(about = "Two-party audio sessions over a rendezvous coordinator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the rendezvous coordinator.
    Serve {
        #[arg(long, default_value = "0.0.0.0:3000")]
        bind: SocketAddr,

        /// Seconds a dropped participant keeps its slot.
        #[arg(long, default_value_t = 10)]
        grace_secs: u64,
    },

    /// Join a session as a headless, receive-only participant.
    Join {
        #[arg(long, default_value = "ws://localhost:3000/ws")]
        url: String,

        #[arg(short, long)]
        session: String,

        /// `host` or `guest`; asked interactively when omitted.
        #[arg(short, long)]
        role: Option<Role>,

        #[arg(long)]
        persistent_id: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve { bind, grace_secs } => {
            println!("{}", "Starting duet coordinator...".green().bold());
            println!("   Listening on ws://{}/ws", bind);

            let config = CoordinatorConfig {
                bind_addr: bind,
                reconnect_grace: Duration::from_secs(grace_secs),
                ..CoordinatorConfig::default()
            };
            duet_server::serve(config).await?;
        }

        Commands::Join {
            url,
            session,
            role,
            persistent_id,
            email,
        } => {
            let role = match role {
                Some(role) => role,
                None => pick_role()?,
            };
            let persistent_id = persistent_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            run_join(url, session, role, persistent_id, email).await?;
        }
    }

    Ok(())
}

fn pick_role() -> Result<Role> {
    if !std::io::stdin().is_terminal() {
        return Ok(Role::Guest);
    }

    let roles = [Role::Host, Role::Guest];
    let picked = Select::new()
        .with_prompt("Join as")
        .items(&["host", "guest"])
        .default(1)
        .interact()
        .context("Failed to read role selection")?;
    Ok(roles[picked])
}

async fn run_join(
    url: String,
    session: String,
    role: Role,
    persistent_id: String,
    email: Option<String>,
) -> Result<()> {
    println!(
        "{} {} as {} ({})",
        "Joining".green().bold(),
        session.bold(),
        role.to_string().cyan(),
        persistent_id
    );

    let channel = RendezvousChannel::new(ChannelConfig::new(url));
    let mut config = SessionConfig::new(
        SessionId::from(session),
        PersistentId::from(persistent_id),
        role,
    );
    config.email = email;

    let handle = spawn_session(config, &channel, Arc::new(RtcPeerConnector), &NoCapture)?;

    let rejected = Arc::new(Notify::new());
    handle
        .set_observer(Arc::new(ConsoleObserver {
            rejected: rejected.clone(),
        }))
        .await?;
    handle.join().await?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for ctrl-c")?;
            info!("Interrupted, leaving session");
            handle.leave().await?;
            // Let the leave reach the coordinator before the channel goes away.
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        _ = rejected.notified() => {}
    }

    channel.disconnect();
    println!("{}", "Bye.".green());
    Ok(())
}

/// Prints what the session controller reports.
struct ConsoleObserver {
    rejected: Arc<Notify>,
}

impl SessionObserver for ConsoleObserver {
    fn on_remote_stream(&self, peer: ConnectionId, stream: RemoteStream) {
        println!(
            "{} from {} (stream {}, track {})",
            "Remote audio".green().bold(),
            peer,
            stream.stream_id,
            stream.track_id
        );
    }

    fn on_connection_state_change(&self, peer: ConnectionId, state: PeerConnectionState) {
        let label = format!("{state:?}");
        let label = match state {
            PeerConnectionState::Connected => label.green(),
            PeerConnectionState::Failed => label.red(),
            PeerConnectionState::Disconnected | PeerConnectionState::Closed => label.yellow(),
            _ => label.normal(),
        };
        println!("Peer {}: {}", peer, label);
    }

    fn on_room_snapshot_changed(&self, snapshot: &RoomSnapshot) {
        println!(
            "{} {} ({} recording)",
            "Room".cyan().bold(),
            snapshot.session_id,
            if snapshot.recording_state.is_recording() {
                "is"
            } else {
                "not"
            }
        );
        for participant in &snapshot.participants {
            println!(
                "   {} {} [{}]",
                participant.role,
                participant.persistent_id,
                participant.connection_id
            );
        }
    }

    fn on_rejected(&self, reason: RejectionReason) {
        let message = match reason {
            RejectionReason::RoomFull => "The session already has two participants.",
            RejectionReason::DuplicateSession => "This identity is already in the session elsewhere.",
        };
        println!("{} {}", "Rejected:".red().bold(), message);
        self.rejected.notify_one();
    }
}
