use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use matatena_core::models::{DieFace, GameStatus, MoveSubmission, UserId};
use matatena_core::{
    ClientCommand, DiceService, Identity, IdentityProvider, ServerEvent, SessionError,
    SessionService,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::services::rooms::{EventSender, RoomMember, RoomRegistry};

/// Verified state of one push connection, fixed at handshake and passed to
/// every handler call for that connection.
#[derive(Clone, Debug)]
pub struct ConnectionContext {
    pub connection_id: u64,
    pub identity: Identity,
    pub sender: EventSender,
}

impl ConnectionContext {
    pub fn send(&self, event: ServerEvent) {
        if self.sender.send(event).is_err() {
            debug!(connection_id = self.connection_id, "reply dropped, connection closed");
        }
    }

    fn member(&self) -> RoomMember {
        RoomMember {
            connection_id: self.connection_id,
            user_id: self.identity.user_id,
            sender: self.sender.clone(),
        }
    }
}

/// How a face sent with `make_move` compares with the last die this server
/// drew for the same player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppliedDie {
    Matches,
    Differs { drawn: DieFace },
    NotDrawnHere,
}

/// Shared state of the push server.
pub struct GameHub {
    sessions: Arc<SessionService>,
    dice: DiceService,
    identities: Arc<dyn IdentityProvider>,
    rooms: RoomRegistry,
    last_drawn: Mutex<HashMap<UserId, DieFace>>,
    handshake_timeout: Duration,
    next_connection: AtomicU64,
}

impl GameHub {
    pub fn new(
        sessions: Arc<SessionService>,
        dice: DiceService,
        identities: Arc<dyn IdentityProvider>,
        handshake_timeout: Duration,
    ) -> Self {
        GameHub {
            sessions,
            dice,
            identities,
            rooms: RoomRegistry::new(),
            last_drawn: Mutex::new(HashMap::new()),
            handshake_timeout,
            next_connection: AtomicU64::new(1),
        }
    }

    #[cfg(test)]
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Admits a connection whose first frame is a valid `authenticate`.
    pub fn authenticate(
        &self,
        first_frame: &str,
        sender: EventSender,
    ) -> Result<ConnectionContext, SessionError> {
        let token = match serde_json::from_str::<ClientCommand>(first_frame) {
            Ok(ClientCommand::Authenticate { token }) => token,
            _ => {
                return Err(SessionError::Unauthenticated(
                    "the first message must authenticate".to_string(),
                ))
            }
        };
        let identity = self.identities.verify_credential(&token)?;
        Ok(ConnectionContext {
            connection_id: self.next_connection.fetch_add(1, Ordering::Relaxed),
            identity,
            sender,
        })
    }

    /// Parses and runs one frame, replying with an `error` event on failure.
    pub async fn dispatch(&self, ctx: &ConnectionContext, frame: &str) {
        let result = match serde_json::from_str::<ClientCommand>(frame) {
            Ok(command) => self.handle_command(ctx, command).await,
            Err(e) => Err(SessionError::InvalidRequest(format!(
                "unreadable message: {}",
                e
            ))),
        };
        if let Err(err) = result {
            warn!(
                connection_id = ctx.connection_id,
                user_id = ctx.identity.user_id,
                error = %err,
                "push request failed"
            );
            ctx.send(ServerEvent::error(err.reason()));
        }
    }

    pub async fn handle_command(
        &self,
        ctx: &ConnectionContext,
        command: ClientCommand,
    ) -> Result<(), SessionError> {
        debug!(connection_id = ctx.connection_id, ?command, "push command");
        match command {
            ClientCommand::Authenticate { .. } => Err(SessionError::InvalidRequest(
                "connection is already authenticated".to_string(),
            )),
            ClientCommand::JoinGame { game_id } => self.join_game(ctx, &game_id).await,
            ClientCommand::MakeMove {
                game_id,
                column,
                dice,
                client_move_id,
            } => {
                self.make_move(ctx, &game_id, column, dice, client_move_id)
                    .await
            }
            ClientCommand::RequestDice => {
                let user_id = ctx.identity.user_id;
                let (dice, probabilities) = self.dice.draw(user_id).await?;
                self.last_drawn.lock().await.insert(user_id, dice);
                ctx.send(ServerEvent::DiceGenerated {
                    dice,
                    user_id,
                    probabilities,
                });
                Ok(())
            }
            ClientCommand::GetState { game_id } => {
                self.sessions
                    .participant_game(&game_id, ctx.identity.user_id)
                    .await?;
                let snapshot = self.sessions.get_state(&game_id).await?;
                ctx.send(ServerEvent::GameState { snapshot });
                Ok(())
            }
            ClientCommand::EndGame { game_id, winner_id } => {
                let result = self
                    .sessions
                    .end_game(&game_id, &ctx.identity, winner_id)
                    .await?;
                self.rooms
                    .broadcast(
                        &game_id,
                        &ServerEvent::GameEnded {
                            game_id: result.game_id,
                            winner_id: result.winner_id,
                            winner_username: result.winner_username,
                        },
                    )
                    .await;
                Ok(())
            }
        }
    }

    async fn join_game(&self, ctx: &ConnectionContext, game_id: &str) -> Result<(), SessionError> {
        let user_id = ctx.identity.user_id;
        let game = self.sessions.participant_game(game_id, user_id).await?;
        let new_member = self.rooms.join(game_id, ctx.member()).await;
        let snapshot = self.sessions.get_state(game_id).await?;
        let status = snapshot.status;
        let members = self.rooms.member_count(game_id).await;
        info!(
            game_id,
            user_id,
            new_member,
            members,
            "joined room"
        );

        ctx.send(ServerEvent::GameJoined {
            game_id: game.game_id.clone(),
            code: game.code.clone(),
            is_host: game.host_id == user_id,
            opponent_name: game.opponent_name(user_id).map(str::to_string),
            game_started: status != GameStatus::Waiting,
            game_ended: status == GameStatus::Finished,
            winner_id: game.winner_id,
            snapshot,
        });

        // the guest arriving in the room is what pairs the two players
        if status == GameStatus::Active
            && game.guest_id == Some(user_id)
            && self.rooms.mark_started(game_id).await
        {
            self.rooms
                .broadcast_except(
                    game_id,
                    ctx.connection_id,
                    &ServerEvent::GameStarted {
                        game_id: game.game_id.clone(),
                        opponent_name: Some(ctx.identity.username.clone()),
                    },
                )
                .await;
        }
        Ok(())
    }

    pub async fn supplied_die(&self, user_id: UserId, dice: i64) -> SuppliedDie {
        match self.last_drawn.lock().await.get(&user_id) {
            Some(drawn) if i64::from(drawn.value()) == dice => SuppliedDie::Matches,
            Some(drawn) => SuppliedDie::Differs { drawn: *drawn },
            None => SuppliedDie::NotDrawnHere,
        }
    }

    async fn make_move(
        &self,
        ctx: &ConnectionContext,
        game_id: &str,
        column: i64,
        dice: Option<i64>,
        client_move_id: Option<String>,
    ) -> Result<(), SessionError> {
        let user_id = ctx.identity.user_id;
        let dice = match dice {
            Some(dice) => {
                match self.supplied_die(user_id, dice).await {
                    SuppliedDie::Matches => {}
                    SuppliedDie::Differs { drawn } => warn!(
                        game_id,
                        user_id,
                        supplied = dice,
                        drawn = drawn.value(),
                        "move carries a face other than the one drawn"
                    ),
                    SuppliedDie::NotDrawnHere => {
                        debug!(game_id, user_id, supplied = dice, "move carries a face drawn elsewhere")
                    }
                }
                dice
            }
            None => {
                self.sessions.participant_game(game_id, user_id).await?;
                i64::from(self.dice.draw(user_id).await?.0.value())
            }
        };

        let outcome = self
            .sessions
            .submit_move(
                game_id,
                &ctx.identity,
                MoveSubmission {
                    column,
                    dice,
                    client_move_id,
                },
            )
            .await?;

        self.last_drawn.lock().await.remove(&user_id);

        let event = ServerEvent::move_made(&outcome.recorded, Some(ctx.identity.username.clone()));
        let delivered = self.rooms.broadcast(game_id, &event).await;
        if delivered == 0 {
            // not in the room yet: the mover still learns the result
            ctx.send(event);
        }
        Ok(())
    }
}

async fn next_text(read: &mut SplitStream<WebSocketStream<TcpStream>>) -> Option<String> {
    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "read failed");
                return None;
            }
        }
    }
    None
}

async fn handle_connection(stream: TcpStream, hub: Arc<GameHub>) {
    let peer = stream.peer_addr().ok();
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(?peer, error = %e, "websocket handshake failed");
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let (sender, mut outbound) = mpsc::unbounded_channel::<ServerEvent>();
    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!(error = %e, "failed to encode event");
                    continue;
                }
            };
            if write.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    let first = tokio::time::timeout(hub.handshake_timeout, next_text(&mut read)).await;
    let admitted = match first {
        Ok(Some(frame)) => hub.authenticate(&frame, sender.clone()),
        Ok(None) => {
            debug!(?peer, "closed before authenticating");
            return;
        }
        Err(_) => Err(SessionError::Unauthenticated(
            "authentication timed out".to_string(),
        )),
    };

    let ctx = match admitted {
        Ok(ctx) => ctx,
        Err(err) => {
            warn!(?peer, reason = err.reason(), "connection rejected");
            let _ = sender.send(ServerEvent::error(err.reason()));
            drop(sender);
            let _ = writer.await;
            return;
        }
    };
    drop(sender);

    info!(
        ?peer,
        connection_id = ctx.connection_id,
        user_id = ctx.identity.user_id,
        "connection admitted"
    );
    ctx.send(ServerEvent::Authenticated {
        user_id: ctx.identity.user_id,
        username: ctx.identity.username.clone(),
    });

    while let Some(frame) = next_text(&mut read).await {
        hub.dispatch(&ctx, &frame).await;
    }

    info!(connection_id = ctx.connection_id, user_id = ctx.identity.user_id, "connection closed");
    writer.abort();
}

pub async fn run_live_game_websocket_server(listener: TcpListener, hub: Arc<GameHub>) {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "live game websocket server listening");
    }
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                tokio::spawn(handle_connection(stream, hub.clone()));
            }
            Err(e) => warn!(error = %e, "accept failed"),
        }
    }
}
