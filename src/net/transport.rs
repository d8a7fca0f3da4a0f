//! TCP transport
//!
//! One task per connection. The connection opens with a JSON handshake, after
//! which the client streams 16-byte handle updates and the server streams
//! 40-byte board frames, all length-prefixed.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::game::state::{MatchId, PlayerId, PlayerSlot};
use crate::lobby::manager::LobbyManager;
use crate::net::framing::{read_message, write_message, FramingError};
use crate::net::protocol::{decode, encode, ClientHello, HandleUpdate, ServerHello};
use crate::net::session::SessionRegistry;

/// TCP match server
pub struct TcpTransport {
    listener: TcpListener,
    lobby: Arc<RwLock<LobbyManager>>,
    sessions: Arc<SessionRegistry>,
}

impl TcpTransport {
    /// Bind the listening socket
    pub async fn bind(
        config: &ServerConfig,
        lobby: Arc<RwLock<LobbyManager>>,
        sessions: Arc<SessionRegistry>,
    ) -> anyhow::Result<Self> {
        let addr = SocketAddr::new(config.bind_address, config.port);
        Self::bind_addr(addr, lobby, sessions).await
    }

    pub async fn bind_addr(
        addr: SocketAddr,
        lobby: Arc<RwLock<LobbyManager>>,
        sessions: Arc<SessionRegistry>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            lobby,
            sessions,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the listener fails
    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!("Match server listening on {}", self.local_addr()?);

        loop {
            let (stream, peer) = self.listener.accept().await?;

            let lobby = self.lobby.clone();
            let sessions = self.sessions.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, lobby, sessions).await {
                    tracing::warn!("Connection error ({}): {}", peer, e);
                }
            });
        }
    }
}

/// Where a handshake placed a connection
#[derive(Debug, Clone, Copy)]
struct Admission {
    match_id: MatchId,
    slot: PlayerSlot,
    /// Set when the server seated the player itself and must unseat them on disconnect
    player_id: Option<PlayerId>,
}

async fn admit(hello: ClientHello, lobby: &RwLock<LobbyManager>) -> Result<Admission, String> {
    match hello {
        ClientHello::Bind { match_id, slot } => {
            let lobby = lobby.read().await;
            let seated = lobby
                .get_room(match_id)
                .and_then(|room| room.player(slot))
                .is_some_and(|player| !player.is_bot);
            if !seated {
                return Err(format!("no player seat {} in match {}", slot, match_id));
            }
            Ok(Admission {
                match_id,
                slot,
                player_id: None,
            })
        }
        ClientHello::QuickPlay { username, practice } => {
            let player_id = Uuid::new_v4();
            let mut lobby = lobby.write().await;
            let placed = if practice {
                lobby
                    .create_practice_room(player_id, username)
                    .map(|match_id| (match_id, PlayerSlot::PlayerOne))
            } else {
                lobby.find_or_create_room(player_id, username)
            };
            let (match_id, slot) = placed.map_err(|e| e.to_string())?;
            Ok(Admission {
                match_id,
                slot,
                player_id: Some(player_id),
            })
        }
    }
}

async fn reject(writer: &mut OwnedWriteHalf, reason: String) -> anyhow::Result<()> {
    tracing::debug!("Rejecting connection: {}", reason);
    let reply = encode(&ServerHello::Rejected { reason })?;
    write_message(writer, &reply).await?;
    Ok(())
}

/// Handle a single connection from handshake to disconnect
async fn handle_connection(
    stream: TcpStream,
    lobby: Arc<RwLock<LobbyManager>>,
    sessions: Arc<SessionRegistry>,
) -> anyhow::Result<()> {
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();

    let hello = match decode::<ClientHello>(&read_message(&mut reader).await?) {
        Ok(hello) => hello,
        Err(e) => return reject(&mut writer, e.to_string()).await,
    };

    let admission = match admit(hello, &lobby).await {
        Ok(admission) => admission,
        Err(reason) => return reject(&mut writer, reason).await,
    };
    let Admission {
        match_id,
        slot,
        player_id,
    } = admission;

    let (binding, mut frames) = sessions.register(match_id, slot);

    let welcome = encode(&ServerHello::Welcome {
        match_id,
        slot,
        player_id,
    })?;
    if let Err(e) = write_message(&mut writer, &welcome).await {
        sessions.unregister(&binding);
        release_seat(&lobby, player_id).await;
        return Err(e.into());
    }
    tracing::info!(%match_id, "Connection bound to {}", slot);

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if let Err(e) = write_message(&mut writer, &frame).await {
                tracing::debug!("Frame write failed: {}", e);
                break;
            }
        }
    });

    // quick-play players are ready as soon as they are seated
    if let Some(player_id) = player_id {
        if let Err(e) = lobby.write().await.set_ready(player_id, true).await {
            tracing::warn!(%match_id, "Could not ready {}: {}", slot, e);
        }
    }

    loop {
        let payload = match read_message(&mut reader).await {
            Ok(payload) => payload,
            Err(FramingError::ConnectionClosed) => break,
            Err(e) => {
                tracing::debug!(%match_id, "Read failed for {}: {}", slot, e);
                break;
            }
        };

        match HandleUpdate::decode(&payload) {
            Ok(update) => {
                lobby.read().await.update_handle(match_id, slot, update.position);
            }
            Err(e) => tracing::debug!(%match_id, "Dropping handle update from {}: {}", slot, e),
        }
    }

    sessions.unregister(&binding);
    writer_task.abort();
    release_seat(&lobby, player_id).await;
    tracing::info!(%match_id, "{} disconnected", slot);

    Ok(())
}

async fn release_seat(lobby: &RwLock<LobbyManager>, player_id: Option<PlayerId>) {
    if let Some(player_id) = player_id {
        if let Err(e) = lobby.write().await.leave_room(player_id).await {
            tracing::debug!("Leave on disconnect: {}", e);
        }
    }
}
