//! Daily game simulators
//!
//! Every game is a pure function of (seed, transcript). The set of games is
//! closed, so dispatch is a plain match on [`GameId`].

pub mod blackjack;
pub mod crash;
pub mod mines;
pub mod plinko;
pub mod rng;
pub mod roulette;
pub mod rules;
pub mod types;

pub use rng::DrawStream;
pub use rules::{GameRules, COINS_PER_POINT};
pub use types::*;

/// Replay a transcript against the seed's world
pub fn simulate(game: GameId, seed: &str, transcript: &[RunAction]) -> SimulationResult {
    let result = match game {
        GameId::Crash => crash::simulate(seed, transcript),
        GameId::Mines => mines::simulate(seed, transcript),
        GameId::Plinko => plinko::simulate(seed, transcript),
        GameId::Blackjack => blackjack::simulate(seed, transcript),
        GameId::Roulette => roulette::simulate(seed, transcript),
    };
    debug_assert!(result.score.is_finite(), "{} produced score {}", game, result.score);
    result
}
