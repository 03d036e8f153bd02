use crate::errors::ArcadeError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{
    blackjack::BlackjackDetails, crash::CrashDetails, mines::MinesDetails,
    plinko::PlinkoDetails, roulette::RouletteDetails,
};

/// Supported daily games
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum GameId {
    Crash,
    Mines,
    Plinko,
    Blackjack,
    Roulette,
}

impl GameId {
    pub const ALL: [GameId; 5] = [
        GameId::Crash,
        GameId::Mines,
        GameId::Plinko,
        GameId::Blackjack,
        GameId::Roulette,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameId::Crash => "crash",
            GameId::Mines => "mines",
            GameId::Plinko => "plinko",
            GameId::Blackjack => "blackjack",
            GameId::Roulette => "roulette",
        }
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameId {
    type Err = ArcadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameId::ALL
            .into_iter()
            .find(|game| game.as_str() == s)
            .ok_or_else(|| ArcadeError::UnknownGame(s.to_string()))
    }
}

/// One recorded player decision
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunAction {
    /// Seconds since the run started, or a sequence index
    #[serde(default)]
    pub at: f64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl RunAction {
    pub fn new(kind: impl Into<String>, at: f64) -> Self {
        Self {
            at,
            kind: kind.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    /// Typed view of the payload; `None` when absent or malformed
    pub fn payload_as<T: DeserializeOwned>(&self) -> Option<T> {
        let payload = self.payload.as_ref()?;
        T::deserialize(payload).ok()
    }

    /// Lenient decoding for client-recorded transcripts: entries that do
    /// not even have the action shape are dropped.
    pub fn transcript_from_values(values: Vec<serde_json::Value>) -> Vec<RunAction> {
        values
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect()
    }
}

/// Output of a simulator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationResult {
    pub score: f64,
    pub details: GameDetails,
}

/// Per-game replay detail (discriminated union)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum GameDetails {
    Crash(CrashDetails),
    Mines(MinesDetails),
    Plinko(PlinkoDetails),
    Blackjack(BlackjackDetails),
    Roulette(RouletteDetails),
}

/// Round to two decimals
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_game_id_parsing() {
        assert_eq!("mines".parse::<GameId>().unwrap(), GameId::Mines);
        assert!(matches!(
            "slots".parse::<GameId>(),
            Err(ArcadeError::UnknownGame(_))
        ));
        for game in GameId::ALL {
            assert_eq!(game.as_str().parse::<GameId>().unwrap(), game);
        }
    }

    #[test]
    fn test_action_wire_shape() {
        let action: RunAction =
            serde_json::from_value(json!({"at": 1.5, "type": "reveal", "payload": {"index": 4}}))
                .unwrap();
        assert!(action.is("reveal"));
        assert_eq!(action.at, 1.5);

        #[derive(Deserialize)]
        struct Reveal {
            index: u8,
        }
        assert_eq!(action.payload_as::<Reveal>().unwrap().index, 4);
    }

    #[test]
    fn test_lenient_transcript_drops_garbage() {
        let transcript = RunAction::transcript_from_values(vec![
            json!({"type": "bank"}),
            json!(42),
            json!({"at": 3}),
            json!({"type": "cashout", "at": 2.0}),
        ]);
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].at, 0.0);
        assert!(transcript[1].is("cashout"));
    }
}
