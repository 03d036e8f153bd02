//! Crash: one multiplier curve, one hidden crash point, one cash-out.

use super::{
    rng::DrawStream,
    types::{round2, GameDetails, RunAction, SimulationResult},
};
use serde::{Deserialize, Serialize};

const FLOOR: f64 = 1.5;
const TAIL_SCALE: f64 = 2.5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrashDetails {
    pub crash_point: f64,
    /// Elapsed seconds of the cash-out, if one was recorded
    pub cashed_out_at: Option<f64>,
    pub multiplier: Option<f64>,
    pub crashed: bool,
}

/// The day's crash multiplier: exponential tail above a 1.5x floor
pub fn crash_point(seed: &str) -> f64 {
    let u = DrawStream::derived(seed, "-crash").next_unit();
    FLOOR - (1.0 - u).ln() * TAIL_SCALE
}

/// Multiplier shown after `t` seconds
pub fn multiplier_at(t: f64) -> f64 {
    1.0 + 0.6 * t + 0.08 * t * t
}

/// Score for cashing out at `multiplier`; reaching the crash point loses.
pub fn settle(crash_point: f64, multiplier: f64) -> f64 {
    if multiplier >= crash_point {
        0.0
    } else {
        round2(multiplier)
    }
}

pub fn simulate(seed: &str, transcript: &[RunAction]) -> SimulationResult {
    let crash_point = crash_point(seed);

    let cashed_out_at = transcript
        .iter()
        .find(|a| a.is("cashout") && a.at.is_finite() && a.at >= 0.0)
        .map(|a| a.at);

    // No cash-out means the player rode the curve into the crash.
    let (score, multiplier) = match cashed_out_at {
        Some(t) => {
            let multiplier = multiplier_at(t);
            (settle(crash_point, multiplier), Some(round2(multiplier)))
        }
        None => (0.0, None),
    };

    SimulationResult {
        score,
        details: GameDetails::Crash(CrashDetails {
            crash_point: round2(crash_point),
            cashed_out_at,
            multiplier,
            crashed: score == 0.0,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cashout(at: f64) -> RunAction {
        RunAction::new("cashout", at)
    }

    #[test]
    fn test_deterministic() {
        let transcript = vec![cashout(2.5)];
        let a = simulate("seed-crash", &transcript);
        let b = simulate("seed-crash", &transcript);
        assert_eq!(a.score.to_bits(), b.score.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn test_crash_point_floor() {
        for i in 0..200 {
            assert!(crash_point(&format!("seed-{}", i)) >= FLOOR);
        }
    }

    #[test]
    fn test_boundary_at_crash_point_is_a_loss() {
        assert_eq!(settle(2.0, 2.0), 0.0);
        assert_eq!(settle(2.0, 1.99), 1.99);
        assert_eq!(settle(2.0, 2.01), 0.0);
    }

    #[test]
    fn test_early_cashout_scores_multiplier() {
        // t = 0 gives 1.0x, always below the 1.5x floor
        let result = simulate("any-seed", &[cashout(0.0)]);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_late_cashout_crashes() {
        let seed = "late";
        let point = crash_point(seed);
        let mut t = 0.0;
        while multiplier_at(t) < point {
            t += 0.25;
        }
        let result = simulate(seed, &[cashout(t)]);
        assert_eq!(result.score, 0.0);
        match result.details {
            GameDetails::Crash(details) => assert!(details.crashed),
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_missing_cashout_is_a_loss() {
        let result = simulate("seed", &[RunAction::new("tick", 1.0)]);
        assert_eq!(result.score, 0.0);
        match result.details {
            GameDetails::Crash(details) => {
                assert!(details.crashed);
                assert!(details.cashed_out_at.is_none());
            }
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_only_first_valid_cashout_counts() {
        let transcript = vec![cashout(-1.0), cashout(0.5), cashout(0.0)];
        let result = simulate("seed", &transcript);
        assert_eq!(result.score, round2(multiplier_at(0.5)));
    }

    #[test]
    fn test_multiplier_curve() {
        assert_eq!(multiplier_at(0.0), 1.0);
        assert!((multiplier_at(5.0) - 6.0).abs() < 1e-12);
    }
}
