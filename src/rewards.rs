//! Coin rewards for verified scores

use crate::games::{GameId, COINS_PER_POINT};

/// Coins requested by a score before the daily cap applies
pub fn requested_coins(score: f64) -> u64 {
    let requested = (score * COINS_PER_POINT).floor();
    if requested.is_finite() && requested > 0.0 {
        requested as u64
    } else {
        0
    }
}

/// Coins for one verified run, given what the player already earned from
/// the same game today. The day's total never exceeds the game's cap.
pub fn award(game: GameId, score: f64, already_awarded: u64) -> u64 {
    let remaining = game
        .rules()
        .max_coins_per_day
        .saturating_sub(already_awarded);
    remaining.min(requested_coins(score))
}
