//! Matatena client: the turn controller, both synchronization paths and a
//! local hot-seat mode.

pub mod config;
pub mod controller;
pub mod error;
pub mod local;
pub mod online;
pub mod poller;
pub mod push;
pub mod rest;

pub use config::ClientConfig;
pub use controller::{reconcile, LedgerUpdate, Reconciled, TurnController, TurnPhase};
pub use error::ClientError;
pub use local::{LocalMatch, LocalTurn};
pub use online::OnlineMatch;
pub use poller::spawn_poller;
pub use push::{spawn_push, PushEvent, PushHandle};
pub use rest::RestClient;
