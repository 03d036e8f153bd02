//! Mines: a 5x5 grid with five hidden mines, revealed one tile at a time.

use super::{
    rng::DrawStream,
    types::{GameDetails, RunAction, SimulationResult},
};
use serde::{Deserialize, Serialize};

pub const GRID_SIZE: usize = 25;
pub const MINE_COUNT: usize = 5;

const BASE_VALUE: f64 = 10.0;
const STEP_PER_REVEAL: f64 = 0.25;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MinesDetails {
    /// Mine cells, ascending
    pub mines: Vec<usize>,
    /// Safe cells in reveal order
    pub reveals: Vec<usize>,
    pub banked: f64,
    pub busted: bool,
}

#[derive(Deserialize)]
struct RevealPayload {
    index: i64,
}

/// Mine cells for a seed, ascending. Draws without replacement so exactly
/// `MINE_COUNT` distinct cells come out.
pub fn mine_positions(seed: &str) -> Vec<usize> {
    let mut stream = DrawStream::derived(seed, "-mines");
    let mut pool: Vec<usize> = (0..GRID_SIZE).collect();
    let mut mines: Vec<usize> = (0..MINE_COUNT)
        .map(|_| pool.remove(stream.next_index(pool.len())))
        .collect();
    mines.sort_unstable();
    mines
}

/// Value of the board after `safe_reveals` safe tiles
pub fn value_after(safe_reveals: usize) -> f64 {
    (BASE_VALUE * (1.0 + safe_reveals as f64 * STEP_PER_REVEAL)).round()
}

pub fn simulate(seed: &str, transcript: &[RunAction]) -> SimulationResult {
    let mines = mine_positions(seed);
    let mut revealed = [false; GRID_SIZE];
    let mut reveals = Vec::new();
    let mut banked: Option<f64> = None;
    let mut busted = false;

    for action in transcript {
        // Repeats are skipped, so at most GRID_SIZE reveals ever count.
        if action.is("reveal") {
            let Some(cell) = action
                .payload_as::<RevealPayload>()
                .and_then(|p| usize::try_from(p.index).ok())
                .filter(|cell| *cell < GRID_SIZE)
            else {
                continue;
            };
            if revealed[cell] {
                continue;
            }
            revealed[cell] = true;

            if mines.binary_search(&cell).is_ok() {
                busted = true;
                break;
            }
            reveals.push(cell);
        } else if action.is("bank") {
            let value = value_after(reveals.len());
            banked = Some(banked.map_or(value, |b: f64| b.max(value)));
        }
    }

    let score = match (busted, banked) {
        (true, banked) => banked.unwrap_or(0.0),
        (false, Some(banked)) => banked,
        // Never banked and still alive: cashed at the last value.
        (false, None) => value_after(reveals.len()),
    };

    SimulationResult {
        score,
        details: GameDetails::Mines(MinesDetails {
            mines,
            reveals,
            banked: banked.unwrap_or(0.0),
            busted,
        }),
    }
}
