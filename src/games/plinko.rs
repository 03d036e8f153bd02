//! Plinko: balls bounce through ten peg rows into seven payout slots.

use super::{
    rng::DrawStream,
    types::{round2, GameDetails, RunAction, SimulationResult},
};
use serde::{Deserialize, Serialize};

pub const PEG_ROWS: usize = 10;
pub const SLOTS: usize = 7;
pub const MAX_DROPS: usize = 10;
pub const SLOT_PAYOUTS: [f64; SLOTS] = [0.2, 0.5, 1.0, 2.0, 1.0, 0.5, 0.2];

const CENTER_PULL: f64 = 0.3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlinkoDetails {
    /// Final slot of each simulated drop
    pub landings: Vec<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DropPayload {
    slot: f64,
    #[serde(default)]
    nudge_row: Option<i64>,
    #[serde(default)]
    nudge_dir: Option<i64>,
}

impl DropPayload {
    fn start_slot(&self) -> Option<usize> {
        if !self.slot.is_finite() {
            return None;
        }
        Some(self.slot.floor().clamp(0.0, (SLOTS - 1) as f64) as usize)
    }

    fn nudge(&self) -> Option<(usize, i64)> {
        let row = usize::try_from(self.nudge_row?).ok()?;
        match self.nudge_dir? {
            dir @ (-1 | 1) => Some((row, dir)),
            _ => None,
        }
    }
}

/// Direction drawn at one peg. Balls right of center lean left and the
/// other way round.
fn bounce(u: f64, position: usize) -> i64 {
    let offset = position as f64 / (SLOTS - 1) as f64 - 0.5;
    if u - offset * CENTER_PULL > 0.5 {
        1
    } else {
        -1
    }
}

fn drop_ball(stream: &mut DrawStream, start: usize, nudge: Option<(usize, i64)>) -> usize {
    let mut position = start as i64;
    for row in 0..PEG_ROWS {
        let drawn = bounce(stream.next_unit(), position as usize);
        let dir = match nudge {
            Some((nudge_row, dir)) if nudge_row == row => dir,
            _ => drawn,
        };
        position = (position + dir).clamp(0, SLOTS as i64 - 1);
    }
    position as usize
}

pub fn simulate(seed: &str, transcript: &[RunAction]) -> SimulationResult {
    let mut stream = DrawStream::derived(seed, "-plinko");

    let landings: Vec<usize> = transcript
        .iter()
        .filter(|a| a.is("drop"))
        .filter_map(|a| a.payload_as::<DropPayload>())
        .filter_map(|p| p.start_slot().map(|slot| (slot, p.nudge())))
        .take(MAX_DROPS)
        .map(|(slot, nudge)| drop_ball(&mut stream, slot, nudge))
        .collect();

    let score = round2(landings.iter().map(|slot| SLOT_PAYOUTS[*slot]).sum());

    SimulationResult {
        score,
        details: GameDetails::Plinko(PlinkoDetails { landings }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn drop_at(slot: i64) -> RunAction {
        RunAction::new("drop", 0.0).with_payload(json!({ "slot": slot }))
    }

    fn landings(result: &SimulationResult) -> Vec<usize> {
        match &result.details {
            GameDetails::Plinko(details) => details.landings.clone(),
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_deterministic() {
        let transcript: Vec<RunAction> = (0..10).map(|i| drop_at(i % 7)).collect();
        assert_eq!(simulate("p", &transcript), simulate("p", &transcript));
    }

    #[test]
    fn test_drops_capped_at_ten() {
        let transcript: Vec<RunAction> = (0..15).map(|_| drop_at(3)).collect();
        let result = simulate("cap", &transcript);
        assert_eq!(landings(&result).len(), MAX_DROPS);
        assert!(result.score <= 2.0 * MAX_DROPS as f64);
    }

    #[test]
    fn test_score_matches_payout_table() {
        let transcript: Vec<RunAction> = (0..10).map(|_| drop_at(3)).collect();
        let result = simulate("table", &transcript);
        let expected: f64 = landings(&result).iter().map(|s| SLOT_PAYOUTS[*s]).sum();
        assert_eq!(result.score, round2(expected));
    }

    #[test]
    fn test_malformed_drops_are_ignored() {
        let transcript = vec![
            RunAction::new("drop", 0.0),
            RunAction::new("drop", 0.0).with_payload(json!({ "slot": "left" })),
            drop_at(99),
            RunAction::new("bank", 0.0),
        ];
        let result = simulate("noise", &transcript);
        assert_eq!(landings(&result).len(), 1);
    }

    #[test]
    fn test_nudge_overrides_drawn_direction() {
        let dir_left = json!({ "slot": 0, "nudgeRow": 0, "nudgeDir": -1 });
        let dir_right = json!({ "slot": 0, "nudgeRow": 9, "nudgeDir": 1 });
        let mut stream = DrawStream::derived("nudge", "-plinko");
        let unnudged = drop_ball(&mut stream, 0, None);
        let mut stream = DrawStream::derived("nudge", "-plinko");
        let nudged = drop_ball(&mut stream, 0, Some((9, 1)));
        assert!(nudged >= unnudged);

        // invalid directions leave the draw alone
        let payload: DropPayload =
            serde_json::from_value(json!({ "slot": 2, "nudgeRow": 1, "nudgeDir": 3 })).unwrap();
        assert!(payload.nudge().is_none());
        let payload: DropPayload = serde_json::from_value(dir_left).unwrap();
        assert_eq!(payload.nudge(), Some((0, -1)));
        let payload: DropPayload = serde_json::from_value(dir_right).unwrap();
        assert_eq!(payload.nudge(), Some((9, 1)));
    }

    #[test]
    fn test_bias_pulls_toward_center() {
        // Same draw, different positions: the edges lean inward.
        assert_eq!(bounce(0.45, 0), 1);
        assert_eq!(bounce(0.55, 6), -1);
        assert_eq!(bounce(0.51, 3), 1);
    }

    #[test]
    fn test_slot_is_clamped() {
        let payload: DropPayload = serde_json::from_value(json!({ "slot": -4 })).unwrap();
        assert_eq!(payload.start_slot(), Some(0));
        let payload: DropPayload = serde_json::from_value(json!({ "slot": 12.7 })).unwrap();
        assert_eq!(payload.start_slot(), Some(6));
    }
}
