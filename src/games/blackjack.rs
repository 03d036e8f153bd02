//! Blackjack: ten hands against the dealer from one shared six-deck shoe.

use super::{
    rng::DrawStream,
    types::{GameDetails, RunAction, SimulationResult},
};
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fmt};

pub const DECKS: usize = 6;
pub const HANDS: usize = 10;

const SUITS: [char; 4] = ['S', 'H', 'D', 'C'];
const RANKS: [&str; 13] = [
    "A", "2", "3", "4", "5", "6", "7", "8", "9", "10", "J", "Q", "K",
];

const BUST_PENALTY: f64 = 5.0;
const WIN_REWARD: f64 = 10.0;
const NATURAL_BONUS: f64 = 5.0;
const PUSH_REWARD: f64 = 2.0;
const DEALER_STANDS_ON: u32 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Card {
    rank: &'static str,
    suit: char,
}

impl Card {
    /// Face value with aces counted high
    fn value(&self) -> u32 {
        match self.rank {
            "A" => 11,
            "J" | "Q" | "K" => 10,
            pip => pip.parse().unwrap_or(0),
        }
    }

    fn is_ace(&self) -> bool {
        self.rank == "A"
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

/// Best total for a hand, demoting aces from 11 to 1 while over 21
pub fn hand_value(cards: &[Card]) -> u32 {
    let mut total: u32 = cards.iter().map(Card::value).sum();
    let mut soft_aces = cards.iter().filter(|c| c.is_ace()).count();
    while total > 21 && soft_aces > 0 {
        total -= 10;
        soft_aces -= 1;
    }
    total
}

/// Six decks, each drawn out of a fresh copy without replacement
pub fn make_shoe(seed: &str) -> Vec<Card> {
    let mut stream = DrawStream::derived(seed, "-shoe");
    let deck: Vec<Card> = SUITS
        .iter()
        .flat_map(|suit| RANKS.iter().map(move |rank| Card { rank: *rank, suit: *suit }))
        .collect();

    let mut shoe = Vec::with_capacity(deck.len() * DECKS);
    for _ in 0..DECKS {
        let mut copy = deck.clone();
        while !copy.is_empty() {
            let idx = stream.next_index(copy.len());
            shoe.push(copy.remove(idx));
        }
    }
    shoe
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Bust,
    Win,
    Push,
    Loss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Hit,
    Stand,
    Double,
}

impl Decision {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "hit" => Some(Decision::Hit),
            "stand" => Some(Decision::Stand),
            "double" => Some(Decision::Double),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandDetails {
    pub hand: usize,
    pub player: Vec<String>,
    pub dealer: Vec<String>,
    pub player_total: u32,
    pub dealer_total: u32,
    pub bet_multiplier: u32,
    pub outcome: Outcome,
    pub delta: f64,
    pub streak: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlackjackDetails {
    pub hands: Vec<HandDetails>,
}

#[derive(Deserialize)]
struct HandPayload {
    hand: usize,
    #[serde(default)]
    decisions: Vec<serde_json::Value>,
}

struct Shoe(VecDeque<Card>);

impl Shoe {
    fn draw(&mut self) -> Option<Card> {
        self.0.pop_front()
    }

    fn deal(&mut self, count: usize) -> Vec<Card> {
        (0..count).map_while(|_| self.draw()).collect()
    }
}

fn decisions_for(transcript: &[RunAction], hand: usize) -> Vec<Decision> {
    transcript
        .iter()
        .filter(|a| a.is("hand"))
        .filter_map(|a| a.payload_as::<HandPayload>())
        .find(|p| p.hand == hand)
        .map(|p| {
            p.decisions
                .iter()
                .filter_map(|d| d.as_str().and_then(Decision::parse))
                .collect()
        })
        .unwrap_or_default()
}

/// Applies the player's decisions; returns the bet multiplier.
fn play_player(shoe: &mut Shoe, player: &mut Vec<Card>, decisions: &[Decision]) -> u32 {
    for decision in decisions {
        if hand_value(player) > 21 {
            break;
        }
        match decision {
            Decision::Hit => match shoe.draw() {
                Some(card) => player.push(card),
                None => break,
            },
            Decision::Stand => break,
            Decision::Double if player.len() == 2 => {
                player.extend(shoe.draw());
                return 2;
            }
            Decision::Double => {}
        }
    }
    1
}

fn play_dealer(shoe: &mut Shoe, dealer: &mut Vec<Card>) {
    while hand_value(dealer) < DEALER_STANDS_ON {
        match shoe.draw() {
            Some(card) => dealer.push(card),
            None => break,
        }
    }
}

pub fn simulate(seed: &str, transcript: &[RunAction]) -> SimulationResult {
    let mut shoe = Shoe(make_shoe(seed).into());
    let mut score = 0.0;
    let mut streak = 0u32;
    let mut hands = Vec::with_capacity(HANDS);

    for hand in 0..HANDS {
        let mut player = shoe.deal(2);
        let mut dealer = shoe.deal(2);
        if player.len() < 2 || dealer.len() < 2 {
            break;
        }

        let bet = play_player(&mut shoe, &mut player, &decisions_for(transcript, hand));
        play_dealer(&mut shoe, &mut dealer);

        let player_total = hand_value(&player);
        let dealer_total = hand_value(&dealer);
        let stake = f64::from(bet);

        let (outcome, delta) = if player_total > 21 {
            streak = 0;
            (Outcome::Bust, -BUST_PENALTY * stake)
        } else if dealer_total > 21 || player_total > dealer_total {
            let natural = player_total == 21 && player.len() == 2;
            streak += 1;
            let bonus = if natural { NATURAL_BONUS } else { 0.0 };
            (Outcome::Win, WIN_REWARD * stake + bonus + f64::from(streak))
        } else if player_total == dealer_total {
            streak = 0;
            (Outcome::Push, PUSH_REWARD)
        } else {
            streak = 0;
            (Outcome::Loss, -BUST_PENALTY * stake)
        };
        score += delta;

        hands.push(HandDetails {
            hand,
            player: player.iter().map(Card::to_string).collect(),
            dealer: dealer.iter().map(Card::to_string).collect(),
            player_total,
            dealer_total,
            bet_multiplier: bet,
            outcome,
            delta,
            streak,
        });
    }

    SimulationResult {
        score,
        details: GameDetails::Blackjack(BlackjackDetails { hands }),
    }
}
