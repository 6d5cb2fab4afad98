pub mod dice;
pub mod games;
