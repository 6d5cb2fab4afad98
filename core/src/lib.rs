//! Matatena game core: scoring, weighted dice, the move ledger and the
//! authoritative session state machine shared by the REST and push servers.

pub mod dice;
pub mod error;
pub mod jwt;
pub mod models;
pub mod protocol;
pub mod repository;
pub mod scoring;
pub mod session;

pub use dice::{select_face, DiceService};
pub use error::{ErrorKind, SessionError};
pub use jwt::{bearer_identity, Identity, IdentityProvider, JwtIdentityProvider};
pub use protocol::{ClientCommand, ServerEvent};
pub use scoring::score;
pub use session::{GameResult, MoveOutcome, RulesPolicy, SessionService, SessionSnapshot};
