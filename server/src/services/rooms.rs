use std::collections::HashMap;

use matatena_core::models::UserId;
use matatena_core::ServerEvent;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Outbound queue of one push connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Clone, Debug)]
pub struct RoomMember {
    pub connection_id: u64,
    pub user_id: UserId,
    pub sender: EventSender,
}

#[derive(Default)]
struct Room {
    members: Vec<RoomMember>,
    /// `game_started` has gone out for this room.
    started: bool,
}

/// One room per game id. Members are added on join and never removed; a send
/// to a closed connection is logged and skipped.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the connection to the room. Returns false if it was already a member.
    pub async fn join(&self, game_id: &str, member: RoomMember) -> bool {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(game_id.to_string()).or_default();
        if room.members.iter().any(|m| m.connection_id == member.connection_id) {
            return false;
        }
        debug!(game_id, connection_id = member.connection_id, user_id = member.user_id, "joined room");
        room.members.push(member);
        true
    }

    /// Marks the room as paired. True only the first time, so a start is
    /// announced once however often either player reconnects.
    pub async fn mark_started(&self, game_id: &str) -> bool {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(game_id.to_string()).or_default();
        !std::mem::replace(&mut room.started, true)
    }

    pub async fn member_count(&self, game_id: &str) -> usize {
        self.rooms.lock().await.get(game_id).map_or(0, |room| room.members.len())
    }

    /// Sends to every member, sender included. Returns how many sends succeeded.
    pub async fn broadcast(&self, game_id: &str, event: &ServerEvent) -> usize {
        self.send_where(game_id, event, |_| true).await
    }

    pub async fn broadcast_except(
        &self,
        game_id: &str,
        connection_id: u64,
        event: &ServerEvent,
    ) -> usize {
        self.send_where(game_id, event, |m| m.connection_id != connection_id)
            .await
    }

    async fn send_where<F>(&self, game_id: &str, event: &ServerEvent, include: F) -> usize
    where
        F: Fn(&RoomMember) -> bool,
    {
        let rooms = self.rooms.lock().await;
        let Some(room) = rooms.get(game_id) else {
            return 0;
        };
        let mut delivered = 0;
        for member in room.members.iter().filter(|m| include(m)) {
            match member.sender.send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(
                    game_id,
                    connection_id = member.connection_id,
                    "room member is no longer connected"
                ),
            }
        }
        delivered
    }
}
