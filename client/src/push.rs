//! The push path: one authenticated WebSocket with bounded reconnects.

use futures_util::{Sink, SinkExt, StreamExt};
use matatena_core::models::UserId;
use matatena_core::{ClientCommand, ServerEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Connected { user_id: UserId, username: String },
    Server(ServerEvent),
    Reconnecting { attempt: u32 },
    /// Reconnection was abandoned. A new connection needs a manual retry.
    Disconnected { reason: String },
}

/// Handle to a running push connection task.
pub struct PushHandle {
    commands: mpsc::UnboundedSender<ClientCommand>,
    task: JoinHandle<()>,
}

impl PushHandle {
    /// Queues a command. Commands sent while reconnecting go out once the
    /// connection is back.
    pub fn send(&self, command: ClientCommand) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::Disconnected { attempts: 0 })
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<ClientCommand> {
        self.commands.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn close(self) {
        self.task.abort();
    }
}

enum SessionEnd {
    /// Every command sender was dropped.
    Closed,
    /// The connection was admitted and later lost.
    Lost,
}

pub fn spawn_push(config: ClientConfig, events: mpsc::UnboundedSender<PushEvent>) -> PushHandle {
    let (commands, receiver) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(config, receiver, events));
    PushHandle { commands, task }
}

async fn run(
    config: ClientConfig,
    mut commands: mpsc::UnboundedReceiver<ClientCommand>,
    events: mpsc::UnboundedSender<PushEvent>,
) {
    let mut rooms: Vec<String> = Vec::new();
    let mut unsent: Option<ClientCommand> = None;
    let mut failures = 0;
    loop {
        let reason = match session(&config, &mut commands, &events, &mut rooms, &mut unsent).await {
            Ok(SessionEnd::Closed) => return,
            Ok(SessionEnd::Lost) => {
                failures = 0;
                "connection lost".to_string()
            }
            Err(ClientError::Rejected(reason)) => {
                warn!(%reason, "push connection rejected");
                let _ = events.send(PushEvent::Disconnected { reason });
                return;
            }
            Err(e) => e.to_string(),
        };

        if failures >= config.reconnect_attempts {
            warn!(attempts = failures, %reason, "giving up on push connection");
            let _ = events.send(PushEvent::Disconnected {
                reason: ClientError::Disconnected { attempts: failures }.to_string(),
            });
            return;
        }
        failures += 1;
        info!(attempt = failures, %reason, "reconnecting");
        let _ = events.send(PushEvent::Reconnecting { attempt: failures });
        sleep(config.reconnect_delay).await;
    }
}

async fn session(
    config: &ClientConfig,
    commands: &mut mpsc::UnboundedReceiver<ClientCommand>,
    events: &mpsc::UnboundedSender<PushEvent>,
    rooms: &mut Vec<String>,
    unsent: &mut Option<ClientCommand>,
) -> Result<SessionEnd, ClientError> {
    let wait = config.handshake_timeout;
    let (ws, _) = timeout(wait, connect_async(config.ws_url.as_str()))
        .await
        .map_err(|_| ClientError::Timeout(wait))??;
    let (mut write, mut read) = ws.split();

    let hello = ClientCommand::Authenticate {
        token: config.token.clone(),
    };
    write.send(Message::Text(serde_json::to_string(&hello)?)).await?;

    let reply = timeout(wait, async {
        while let Some(message) = read.next().await {
            if let Message::Text(text) = message? {
                return Ok::<_, ClientError>(Some(serde_json::from_str::<ServerEvent>(&text)?));
            }
        }
        Ok(None)
    })
    .await
    .map_err(|_| ClientError::Timeout(wait))??;

    match reply {
        Some(ServerEvent::Authenticated { user_id, username }) => {
            info!(user_id, "push connection admitted");
            let _ = events.send(PushEvent::Connected { user_id, username });
        }
        Some(ServerEvent::Error { message }) => return Err(ClientError::Rejected(message)),
        Some(other) => {
            return Err(ClientError::Rejected(format!(
                "unexpected handshake reply {:?}",
                other
            )))
        }
        None => return Err(ClientError::Rejected("closed during handshake".to_string())),
    }

    // rooms are per connection on the server side
    for game_id in rooms.iter() {
        let join = ClientCommand::JoinGame {
            game_id: game_id.clone(),
        };
        if write.send(Message::Text(serde_json::to_string(&join)?)).await.is_err() {
            return Ok(SessionEnd::Lost);
        }
    }
    if let Some(command) = unsent.take() {
        debug!(?command, "resending command from the lost connection");
        if !deliver(&mut write, command, unsent).await? {
            return Ok(SessionEnd::Lost);
        }
    }

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    let _ = write.close().await;
                    return Ok(SessionEnd::Closed);
                };
                if let ClientCommand::JoinGame { game_id } = &command {
                    if !rooms.contains(game_id) {
                        rooms.push(game_id.clone());
                    }
                }
                if !deliver(&mut write, command, unsent).await? {
                    return Ok(SessionEnd::Lost);
                }
            }
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => {
                        debug!(?event, "push event");
                        let _ = events.send(PushEvent::Server(event));
                    }
                    Err(e) => warn!(error = %e, "unreadable push event"),
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return Ok(SessionEnd::Lost),
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Writes one command. A command the socket refuses is kept in `unsent` for
/// the next connection; returns false in that case.
async fn deliver<S>(
    write: &mut S,
    command: ClientCommand,
    unsent: &mut Option<ClientCommand>,
) -> Result<bool, ClientError>
where
    S: Sink<Message> + Unpin,
{
    let text = serde_json::to_string(&command)?;
    if write.send(Message::Text(text)).await.is_err() {
        *unsent = Some(command);
        return Ok(false);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    fn config(url: String) -> ClientConfig {
        ClientConfig::new("http://unused", url, "tok")
            .with_reconnect_attempts(2)
            .with_reconnect_delay(Duration::from_millis(10))
            .with_handshake_timeout(Duration::from_secs(2))
    }

    async fn text(ws: &mut tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> ClientCommand {
        loop {
            if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn authenticates_then_relays_both_ways() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            assert_eq!(text(&mut ws).await, ClientCommand::Authenticate { token: "tok".into() });
            let admitted = ServerEvent::Authenticated { user_id: 3, username: "cem".into() };
            ws.send(Message::Text(serde_json::to_string(&admitted).unwrap())).await.unwrap();
            assert_eq!(text(&mut ws).await, ClientCommand::RequestDice);
            ws.send(Message::Text(serde_json::to_string(&ServerEvent::error("nope")).unwrap()))
                .await
                .unwrap();
        });

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let handle = spawn_push(config(url), events_tx);
        handle.send(ClientCommand::RequestDice).unwrap();

        assert_eq!(
            events.recv().await,
            Some(PushEvent::Connected { user_id: 3, username: "cem".into() })
        );
        assert_eq!(
            events.recv().await,
            Some(PushEvent::Server(ServerEvent::error("nope")))
        );
        server.await.unwrap();
        handle.close();
    }

    #[tokio::test]
    async fn gives_up_after_the_configured_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let handle = spawn_push(config(url), events_tx);

        assert_eq!(events.recv().await, Some(PushEvent::Reconnecting { attempt: 1 }));
        assert_eq!(events.recv().await, Some(PushEvent::Reconnecting { attempt: 2 }));
        assert!(matches!(events.recv().await, Some(PushEvent::Disconnected { .. })));
        assert_eq!(events.recv().await, None);

        let PushHandle { commands, task } = handle;
        task.await.unwrap();
        assert!(commands.is_closed());
    }

    #[tokio::test]
    async fn refused_writes_keep_the_command() {
        let broken = futures_util::sink::unfold((), |(), _: Message| async {
            Err::<(), _>(ClientError::Disconnected { attempts: 0 })
        });
        futures_util::pin_mut!(broken);
        let mut unsent = None;

        let sent = deliver(&mut broken, ClientCommand::RequestDice, &mut unsent)
            .await
            .unwrap();
        assert!(!sent);
        assert_eq!(unsent, Some(ClientCommand::RequestDice));
    }

    #[tokio::test]
    async fn commands_queued_while_down_go_out_after_reconnecting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (dropped_tx, dropped_rx) = tokio::sync::oneshot::channel();
        let server = tokio::spawn(async move {
            let admitted = ServerEvent::Authenticated { user_id: 3, username: "cem".into() };
            // first connection: admit, then hang up
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _ = text(&mut ws).await;
            ws.send(Message::Text(serde_json::to_string(&admitted).unwrap())).await.unwrap();
            drop(ws);
            let _ = dropped_tx.send(());

            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _ = text(&mut ws).await;
            ws.send(Message::Text(serde_json::to_string(&admitted).unwrap())).await.unwrap();
            text(&mut ws).await
        });

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let handle = spawn_push(config(url), events_tx);
        assert!(matches!(events.recv().await, Some(PushEvent::Connected { .. })));
        dropped_rx.await.unwrap();
        assert_eq!(events.recv().await, Some(PushEvent::Reconnecting { attempt: 1 }));
        handle.send(ClientCommand::RequestDice).unwrap();

        assert_eq!(server.await.unwrap(), ClientCommand::RequestDice);
        handle.close();
    }

    #[tokio::test]
    async fn rejected_credentials_are_not_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _ = text(&mut ws).await;
            let reply = ServerEvent::error("invalid or expired token");
            ws.send(Message::Text(serde_json::to_string(&reply).unwrap())).await.unwrap();
        });

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let _handle = spawn_push(config(url), events_tx);
        assert_eq!(
            events.recv().await,
            Some(PushEvent::Disconnected { reason: "invalid or expired token".into() })
        );
    }
}
