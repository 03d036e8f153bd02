//! Daily and all-time leaderboards
//!
//! A player's daily figure is the sum of their best `bestOf` verified
//! scores for that game and day. It is always recomputed from the runs, so
//! concurrent recomputes for the same key settle on the same value.

use crate::{
    errors::ArcadeResult,
    games::GameId,
    store::{GameStore, LeaderboardAggregate, PlayerId},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, collections::HashSet, fmt, str::FromStr, sync::Arc};
use tracing::debug;

pub const TOP_N: usize = 20;
const FALLBACK_NAME: &str = "player";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Daily,
    AllTime,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Daily => "daily",
            Scope::AllTime => "alltime",
        })
    }
}

impl FromStr for Scope {
    type Err = crate::errors::ArcadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Scope::Daily),
            "alltime" => Ok(Scope::AllTime),
            other => Err(crate::errors::ArcadeError::InvalidInput(format!(
                "unknown leaderboard scope '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player_id: PlayerId,
    pub display_name: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardView {
    pub game_id: GameId,
    pub scope: Scope,
    pub top: Vec<LeaderboardEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_score: Option<f64>,
}

/// Sum of the `best_of` highest scores
pub fn best_of_sum(scores: &[f64], best_of: usize) -> f64 {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted.iter().take(best_of).sum()
}

/// Descending by score; equal scores keep their input order.
pub fn rank_totals(mut totals: Vec<(PlayerId, f64)>) -> Vec<(PlayerId, f64)> {
    totals.sort_by(|a, b| b.1.total_cmp(&a.1));
    totals
}

pub struct LeaderboardAggregator {
    store: Arc<dyn GameStore>,
}

impl LeaderboardAggregator {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Rebuild one player's daily figure from their verified runs
    pub fn recompute(
        &self,
        player: &PlayerId,
        game: GameId,
        date: &str,
    ) -> ArcadeResult<LeaderboardAggregate> {
        let scores: Vec<f64> = self
            .store
            .daily_runs(player, game, date)?
            .into_iter()
            .filter(|run| run.verified)
            .map(|run| run.score)
            .collect();

        let aggregate = LeaderboardAggregate {
            game,
            date: date.to_string(),
            player_id: player.clone(),
            score: best_of_sum(&scores, game.rules().best_of),
        };
        self.store.put_aggregate(&aggregate)?;
        debug!(%player, %game, date, score = aggregate.score, runs = scores.len(), "aggregate recomputed");
        Ok(aggregate)
    }

    /// Top entries plus the requester's own position.
    ///
    /// `friends_only` narrows the field to the requester and their friends
    /// and is ignored without a requester.
    pub fn rank(
        &self,
        game: GameId,
        scope: Scope,
        today: &str,
        requester: Option<&PlayerId>,
        friends_only: bool,
    ) -> ArcadeResult<LeaderboardView> {
        let totals = match scope {
            Scope::Daily => self
                .store
                .daily_aggregates(game, today)?
                .into_iter()
                .map(|agg| (agg.player_id, agg.score))
                .collect(),
            Scope::AllTime => sum_by_player(self.store.game_aggregates(game)?),
        };

        let totals = match (requester, friends_only) {
            (Some(me), true) => {
                let mut circle: HashSet<PlayerId> =
                    self.store.friends_of(me)?.into_iter().collect();
                circle.insert(me.clone());
                totals
                    .into_iter()
                    .filter(|(player, _)| circle.contains(player))
                    .collect()
            }
            _ => totals,
        };

        let ranked = rank_totals(totals);

        let mine = requester.and_then(|me| {
            ranked
                .iter()
                .position(|(player, _)| player == me)
                .map(|idx| (idx + 1, ranked[idx].1))
        });

        let mut top = Vec::with_capacity(TOP_N.min(ranked.len()));
        for (idx, (player_id, score)) in ranked.into_iter().take(TOP_N).enumerate() {
            let display_name = self
                .store
                .get_player(&player_id)?
                .map(|p| p.display_name)
                .unwrap_or_else(|| FALLBACK_NAME.to_string());
            top.push(LeaderboardEntry {
                rank: idx + 1,
                player_id,
                display_name,
                score,
            });
        }

        Ok(LeaderboardView {
            game_id: game,
            scope,
            top,
            my_rank: mine.map(|(rank, _)| rank),
            my_score: mine.map(|(_, score)| score),
        })
    }
}

/// Per-player sum, in order of each player's first appearance
fn sum_by_player(aggregates: Vec<LeaderboardAggregate>) -> Vec<(PlayerId, f64)> {
    let mut index: HashMap<PlayerId, usize> = HashMap::new();
    let mut totals: Vec<(PlayerId, f64)> = Vec::new();
    for agg in aggregates {
        match index.get(&agg.player_id) {
            Some(&slot) => totals[slot].1 += agg.score,
            None => {
                index.insert(agg.player_id.clone(), totals.len());
                totals.push((agg.player_id, agg.score));
            }
        }
    }
    totals
}
