use matatena_core::models::{ColumnSlot, DieFace, Game, MoveSubmission, UserId};
use matatena_core::{ClientCommand, GameResult, MoveOutcome, ServerEvent, SessionSnapshot};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::controller::{LedgerUpdate, Reconciled, TurnController};
use crate::error::ClientError;
use crate::push::PushEvent;
use crate::rest::RestClient;

/// One player's seat in an online game: the turn controller fed by both the
/// push and pull paths, and moves dispatched over both.
pub struct OnlineMatch {
    game_id: String,
    controller: TurnController,
    rest: RestClient,
    push: Option<mpsc::UnboundedSender<ClientCommand>>,
    /// A die request is out on the push path and not yet answered.
    awaiting_die: bool,
}

impl OnlineMatch {
    pub fn new(
        game: &Game,
        me: UserId,
        rest: RestClient,
        push: Option<mpsc::UnboundedSender<ClientCommand>>,
    ) -> Result<Self, ClientError> {
        let side = game.side_of(me).ok_or_else(|| ClientError::Api {
            status: 403,
            message: "you are not a player in this game".to_string(),
        })?;
        let opponent = game.user_on(side.opponent());
        Ok(OnlineMatch {
            game_id: game.game_id.clone(),
            controller: TurnController::new(me, side, opponent),
            rest,
            push,
            awaiting_die: false,
        })
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn controller(&self) -> &TurnController {
        &self.controller
    }

    fn push(&self, command: ClientCommand) -> bool {
        match &self.push {
            Some(push) => push.send(command).is_ok(),
            None => false,
        }
    }

    /// Subscribes the push connection to this game's room.
    pub fn join_room(&self) -> bool {
        self.push(ClientCommand::JoinGame {
            game_id: self.game_id.clone(),
        })
    }

    /// Asks the server for a die when it is this player's turn, none is in
    /// hand and no request is outstanding. Returns whether a request went out.
    pub fn request_die(&mut self) -> bool {
        if !self.controller.wants_die() || self.awaiting_die {
            return false;
        }
        self.awaiting_die = self.push(ClientCommand::RequestDice);
        self.awaiting_die
    }

    /// Pull-path fallback for [`request_die`](Self::request_die).
    pub async fn roll_die(&mut self) -> Result<DieFace, ClientError> {
        let roll = self.rest.roll_dice().await?;
        self.controller.offer_die(roll.dice)?;
        Ok(roll.dice)
    }

    /// Gets a die over whichever path is up.
    async fn ensure_die(&mut self) {
        if !self.controller.wants_die() || self.awaiting_die || self.request_die() {
            return;
        }
        if let Err(e) = self.roll_die().await {
            warn!(error = %e, "could not roll over REST");
        }
    }

    pub fn handle_snapshot(&mut self, snapshot: &SessionSnapshot) -> Reconciled {
        let side = self.controller.side();
        if let Some(opponent) = snapshot.game.user_on(side.opponent()) {
            self.controller.set_opponent(opponent);
        }
        let result = self.controller.apply(&LedgerUpdate::from(snapshot));
        self.updated(result);
        result
    }

    fn updated(&mut self, result: Reconciled) {
        if result == Reconciled::Applied {
            self.request_die();
        }
    }

    pub fn handle_event(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::GameJoined { snapshot, .. } | ServerEvent::GameState { snapshot } => {
                self.handle_snapshot(snapshot);
            }
            ServerEvent::GameStarted { game_id, .. } if *game_id == self.game_id => {
                // the opponent's id comes with the next snapshot
                self.push(ClientCommand::GetState {
                    game_id: self.game_id.clone(),
                });
            }
            ServerEvent::MoveMade { game_id, .. } if *game_id == self.game_id => {
                if let Some(update) = LedgerUpdate::from_event(event) {
                    let result = self.controller.apply(&update);
                    self.updated(result);
                }
            }
            ServerEvent::DiceGenerated { dice, user_id, .. } if *user_id == self.controller.me() => {
                self.awaiting_die = false;
                if let Err(e) = self.controller.offer_die(*dice) {
                    debug!(error = %e, "ignored die");
                }
            }
            ServerEvent::GameEnded {
                game_id,
                winner_id,
                winner_username,
            } if *game_id == self.game_id => {
                info!(winner_id, winner = ?winner_username, "game over");
                self.controller.finish(*winner_id);
                self.awaiting_die = false;
            }
            ServerEvent::Error { message } => warn!(%message, "server error"),
            _ => {}
        }
    }

    /// Places the die in hand. The move goes out over the push path and the
    /// REST path; the shared `client_move_id` keeps it to one ledger entry.
    pub async fn place(
        &mut self,
        face: DieFace,
        column: ColumnSlot,
    ) -> Result<MoveOutcome, ClientError> {
        let pending = self.controller.place(face, column)?;
        self.push(ClientCommand::MakeMove {
            game_id: self.game_id.clone(),
            column: i64::from(column.value()),
            dice: Some(i64::from(face.value())),
            client_move_id: Some(pending.client_move_id.clone()),
        });

        let submission = MoveSubmission {
            column: i64::from(column.value()),
            dice: i64::from(face.value()),
            client_move_id: Some(pending.client_move_id),
        };
        match self.rest.submit_move(&self.game_id, &submission).await {
            Ok(outcome) => {
                self.controller.confirm(&outcome.recorded);
                if let Some(winner) = self.controller.take_declaration() {
                    self.declare(winner).await?;
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "move dispatch failed");
                self.controller.fail();
                Err(e)
            }
        }
    }

    /// Feeds push events and polled snapshots into the controller until the
    /// game has a winner or both producers stop. Dice are fetched whenever
    /// the turn comes back to this player.
    pub async fn run(
        &mut self,
        mut push_events: mpsc::UnboundedReceiver<PushEvent>,
        mut snapshots: mpsc::UnboundedReceiver<SessionSnapshot>,
    ) -> Option<UserId> {
        let mut push_open = true;
        let mut poll_open = true;
        while push_open || poll_open {
            if let Some(winner) = self.controller.winner() {
                return Some(winner);
            }
            self.ensure_die().await;
            tokio::select! {
                event = push_events.recv(), if push_open => match event {
                    Some(PushEvent::Server(event)) => self.handle_event(&event),
                    Some(PushEvent::Connected { .. }) => {
                        // a request sent before a reconnect may have been lost
                        self.awaiting_die = false;
                    }
                    Some(PushEvent::Reconnecting { attempt }) => {
                        debug!(attempt, "push path reconnecting")
                    }
                    Some(PushEvent::Disconnected { reason }) => {
                        warn!(%reason, "push path gone, polling only");
                        self.push = None;
                        self.awaiting_die = false;
                    }
                    None => push_open = false,
                },
                snapshot = snapshots.recv(), if poll_open => match snapshot {
                    Some(snapshot) => {
                        self.handle_snapshot(&snapshot);
                    }
                    None => poll_open = false,
                },
            }
        }
        self.controller.winner()
    }

    async fn declare(&mut self, winner_id: UserId) -> Result<GameResult, ClientError> {
        self.push(ClientCommand::EndGame {
            game_id: self.game_id.clone(),
            winner_id,
        });
        let result = self.rest.end_game(&self.game_id, winner_id).await?;
        self.controller.finish(result.winner_id);
        Ok(result)
    }
}
