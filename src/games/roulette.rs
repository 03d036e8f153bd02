//! Roulette: ten spins on a single-zero wheel with a 100-coin bankroll.

use super::{
    rng::DrawStream,
    types::{GameDetails, RunAction, SimulationResult},
};
use serde::{Deserialize, Serialize};

pub const SPINS: usize = 10;
pub const POCKETS: usize = 37;
pub const STARTING_BANKROLL: f64 = 100.0;

/// Share of any net gain that is taken back from the final score
const GAIN_PENALTY: f64 = 0.1;

const REDS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Bet {
    Red { amount: f64 },
    Black { amount: f64 },
    Even { amount: f64 },
    Odd { amount: f64 },
    Dozen { amount: f64, value: u8 },
    Straight { amount: f64, value: u8 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpinDetails {
    pub spin: usize,
    pub result: u8,
    pub bets: Vec<Bet>,
    pub net: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouletteDetails {
    pub spins: Vec<SpinDetails>,
    pub bankroll: f64,
}

/// Bet as sent by the client, before validation
#[derive(Deserialize)]
struct RawBet {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: Option<f64>,
    amount: f64,
}

impl RawBet {
    fn validate(self) -> Option<Bet> {
        let amount = self.amount;
        if !amount.is_finite() || amount <= 0.0 {
            return None;
        }
        let value_in = |lo: f64, hi: f64| {
            self.value
                .filter(|v| v.fract() == 0.0 && (lo..=hi).contains(v))
                .map(|v| v as u8)
        };
        match self.kind.as_str() {
            "red" => Some(Bet::Red { amount }),
            "black" => Some(Bet::Black { amount }),
            "even" => Some(Bet::Even { amount }),
            "odd" => Some(Bet::Odd { amount }),
            "dozen" => {
                let value = match self.value {
                    None => 1,
                    Some(_) => value_in(1.0, 3.0)?,
                };
                Some(Bet::Dozen { amount, value })
            }
            "straight" => Some(Bet::Straight {
                amount,
                value: value_in(0.0, 36.0)?,
            }),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct SpinPayload {
    spin: usize,
    #[serde(default)]
    bets: Vec<serde_json::Value>,
}

fn is_red(pocket: u8) -> bool {
    REDS.contains(&pocket)
}

/// Pocket for spin `index`; each spin has its own sub-stream.
pub fn spin_result(seed: &str, index: usize) -> u8 {
    let mut stream = DrawStream::derived(seed, &format!("-roulette{}", index));
    stream.next_index(POCKETS) as u8
}

/// Net change to the bankroll for one bet
pub fn payout(bet: &Bet, result: u8) -> f64 {
    let (amount, won, odds) = match *bet {
        Bet::Red { amount } => (amount, is_red(result), 1.0),
        Bet::Black { amount } => (amount, result != 0 && !is_red(result), 1.0),
        Bet::Even { amount } => (amount, result != 0 && result % 2 == 0, 1.0),
        Bet::Odd { amount } => (amount, result % 2 == 1, 1.0),
        Bet::Dozen { amount, value } => {
            let start = (value - 1) * 12 + 1;
            (amount, (start..start + 12).contains(&result), 2.0)
        }
        Bet::Straight { amount, value } => (amount, value == result, 35.0),
    };
    if won {
        amount * odds
    } else {
        -amount
    }
}

impl Bet {
    pub fn amount(&self) -> f64 {
        match *self {
            Bet::Red { amount }
            | Bet::Black { amount }
            | Bet::Even { amount }
            | Bet::Odd { amount }
            | Bet::Dozen { amount, .. }
            | Bet::Straight { amount, .. } => amount,
        }
    }
}

/// Valid bets for `spin`, in order, while their combined stake fits in
/// `bankroll`. A bet that would overdraw is skipped.
fn bets_for(transcript: &[RunAction], spin: usize, bankroll: f64) -> Vec<Bet> {
    let mut available = bankroll.max(0.0);
    transcript
        .iter()
        .filter(|a| a.is("spin"))
        .filter_map(|a| a.payload_as::<SpinPayload>())
        .find(|p| p.spin == spin)
        .map(|p| {
            p.bets
                .into_iter()
                .filter_map(|raw| serde_json::from_value::<RawBet>(raw).ok())
                .filter_map(RawBet::validate)
                .filter(|bet| {
                    let stake = bet.amount();
                    if stake > available {
                        return false;
                    }
                    available -= stake;
                    true
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Final bankroll less a tenth of any profit, rounded half up
pub fn score_for(bankroll: f64) -> f64 {
    let penalty = (bankroll - STARTING_BANKROLL).max(0.0) * GAIN_PENALTY;
    (bankroll - penalty + 0.5).floor()
}

pub fn simulate(seed: &str, transcript: &[RunAction]) -> SimulationResult {
    let mut bankroll = STARTING_BANKROLL;
    let mut spins = Vec::with_capacity(SPINS);

    for spin in 0..SPINS {
        let result = spin_result(seed, spin);
        let bets = bets_for(transcript, spin, bankroll);
        let net: f64 = bets.iter().map(|bet| payout(bet, result)).sum();
        bankroll += net;
        spins.push(SpinDetails {
            spin,
            result,
            bets,
            net,
        });
    }

    SimulationResult {
        score: score_for(bankroll),
        details: GameDetails::Roulette(RouletteDetails { spins, bankroll }),
    }
}
