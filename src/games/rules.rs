//! Per-game rules and catalog metadata

use super::types::GameId;
use serde::{Deserialize, Serialize};

/// Coins requested per point of score
pub const COINS_PER_POINT: f64 = 2.0;

/// Daily limits for one game
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameRules {
    /// Runs a player is expected to start per day
    pub tickets: u32,
    /// How many of the day's best scores count toward the leaderboard
    pub best_of: usize,
    pub max_coins_per_day: u64,
}

impl GameId {
    pub fn rules(&self) -> GameRules {
        match self {
            GameId::Crash => GameRules {
                tickets: 10,
                best_of: 3,
                max_coins_per_day: 500,
            },
            GameId::Mines => GameRules {
                tickets: 5,
                best_of: 3,
                max_coins_per_day: 400,
            },
            GameId::Plinko => GameRules {
                tickets: 3,
                best_of: 1,
                max_coins_per_day: 350,
            },
            GameId::Blackjack => GameRules {
                tickets: 3,
                best_of: 1,
                max_coins_per_day: 300,
            },
            GameId::Roulette => GameRules {
                tickets: 3,
                best_of: 1,
                max_coins_per_day: 300,
            },
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            GameId::Crash => "Daily Crash Run",
            GameId::Mines => "Mines Run",
            GameId::Plinko => "Plinko Trials",
            GameId::Blackjack => "Blackjack Challenge",
            GameId::Roulette => "Roulette Strategy",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            GameId::Crash => "Tap to cash out before the inevitable crash. Timing matters!",
            GameId::Mines => "Navigate a 5x5 grid and bank your winnings before you hit a mine.",
            GameId::Plinko => "Drop 10 balls, aim your slot, and use one nudge to steer fate.",
            GameId::Blackjack => "Play 10 hands against the dealer using the shared daily shoe.",
            GameId::Roulette => "Allocate bets for 10 spins; grow your bankroll efficiently.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caps_and_best_of() {
        let caps: Vec<u64> = GameId::ALL.iter().map(|g| g.rules().max_coins_per_day).collect();
        assert_eq!(caps, vec![500, 400, 350, 300, 300]);
        assert_eq!(GameId::Crash.rules().best_of, 3);
        assert_eq!(GameId::Mines.rules().best_of, 3);
        assert_eq!(GameId::Roulette.rules().best_of, 1);
    }
}
