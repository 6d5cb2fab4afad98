pub mod board;
pub mod game;
pub mod play;
pub mod profile;

pub use board::{current_turn, next_side, Board, COLUMN_CAPACITY};
pub use game::{Game, GameStatus, Side, UserId};
pub use play::{ColumnSlot, DieFace, Move, MoveSubmission, NewMove};
pub use profile::{DiceProfile, DiceWeights};
