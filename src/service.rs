//! Run lifecycle and read models
//!
//! `ArcadeService` is synchronous: every call blocks on the store. The HTTP
//! layer moves calls onto the blocking pool.

use crate::{
    config::{ArcadeConfig, GameplayConfig, StorageBackend},
    errors::{ArcadeError, ArcadeResult},
    fairness::{RevealedSeed, SeedAuthority},
    games::{self, GameId, GameRules, RunAction},
    leaderboard::{LeaderboardAggregator, LeaderboardView, Scope},
    metrics::ArcadeMetrics,
    rewards,
    storage::RocksStorage,
    store::{GameStore, KvGameStore, Player, PlayerId, Run, RunSettlement},
    time::{format_date, parse_date, CivilCalendar, Clock, SystemClock},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_DISPLAY_NAME: usize = 32;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StartedRun {
    pub run_id: String,
    pub seed_hash: String,
    pub date: String,
    pub game_id: GameId,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinishedRun {
    pub score: f64,
    pub coins: u64,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: GameId,
    pub title: &'static str,
    pub description: &'static str,
    #[serde(flatten)]
    pub rules: GameRules,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs_today: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coins_today: Option<u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    pub game_id: GameId,
    pub runs_played: usize,
    pub best_score: Option<f64>,
    pub coins_earned: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub player_id: PlayerId,
    pub display_name: Option<String>,
    pub balance: u64,
    pub games: Vec<GameStats>,
}

/// Resolve the caller identity handed over by the account subsystem
pub fn authenticate(raw: Option<&str>) -> ArcadeResult<PlayerId> {
    let raw = raw.ok_or_else(|| ArcadeError::Unauthorized("missing player identity".to_string()))?;
    PlayerId::parse(raw).map_err(|_| ArcadeError::Unauthorized("malformed player identity".to_string()))
}

pub struct ArcadeService {
    gameplay: GameplayConfig,
    store: Arc<dyn GameStore>,
    seeds: SeedAuthority,
    leaderboard: LeaderboardAggregator,
    calendar: CivilCalendar,
    metrics: Option<Arc<ArcadeMetrics>>,
}

impl ArcadeService {
    pub fn new(
        config: &ArcadeConfig,
        store: Arc<dyn GameStore>,
        clock: Arc<dyn Clock>,
        metrics: Option<Arc<ArcadeMetrics>>,
    ) -> ArcadeResult<Self> {
        config.validate()?;
        let calendar = CivilCalendar::new(config.timezone()?, clock);
        Ok(Self {
            gameplay: config.gameplay.clone(),
            seeds: SeedAuthority::new(&config.fairness.secret_key, store.clone())?,
            leaderboard: LeaderboardAggregator::new(store.clone()),
            store,
            calendar,
            metrics,
        })
    }

    /// Open the configured backend on the wall clock
    pub fn from_config(config: &ArcadeConfig) -> ArcadeResult<Self> {
        let store: Arc<dyn GameStore> = match config.storage.backend {
            StorageBackend::RocksDb => {
                Arc::new(KvGameStore::new(RocksStorage::open(&config.storage)?))
            }
            StorageBackend::Memory => Arc::new(KvGameStore::in_memory()),
        };

        let metrics = if config.monitoring.enable_metrics {
            let metrics = ArcadeMetrics::new().map_err(|e| {
                ArcadeError::Configuration(crate::errors::ConfigurationError::ValidationFailed(
                    format!("metrics registry: {}", e),
                ))
            })?;
            Some(Arc::new(metrics))
        } else {
            None
        };

        Self::new(config, store, Arc::new(SystemClock), metrics)
    }

    pub fn metrics(&self) -> Option<&Arc<ArcadeMetrics>> {
        self.metrics.as_ref()
    }

    pub fn today(&self) -> String {
        format_date(self.calendar.today())
    }

    fn track<T>(&self, result: ArcadeResult<T>) -> ArcadeResult<T> {
        if let (Err(e), Some(metrics)) = (&result, &self.metrics) {
            metrics.record_error(e);
        }
        result
    }

    /// Open a fresh run on today's commitment
    pub fn start_run(&self, caller: &PlayerId, game: GameId) -> ArcadeResult<StartedRun> {
        let result = self.start_run_inner(caller, game);
        self.track(result)
    }

    fn start_run_inner(&self, caller: &PlayerId, game: GameId) -> ArcadeResult<StartedRun> {
        let now = self.calendar.now();
        let commitment = self.seeds.commit_seed(game, self.calendar.today(), now)?;
        let run = Run::new(
            Uuid::new_v4().to_string(),
            caller.clone(),
            game,
            commitment.date.clone(),
            now,
        );
        self.store.insert_run(&run)?;

        if let Some(metrics) = &self.metrics {
            metrics.record_run_started(game);
        }
        info!(run_id = %run.id, player_id = %caller, %game, date = %run.date, "run started");

        Ok(StartedRun {
            run_id: run.id,
            seed_hash: commitment.seed_hash,
            date: commitment.date,
            game_id: game,
        })
    }

    /// Append one decision to the caller's open run
    pub fn append_action(
        &self,
        caller: &PlayerId,
        run_id: &str,
        action: RunAction,
    ) -> ArcadeResult<Vec<RunAction>> {
        let result = self
            .store
            .append_action(run_id, caller, action, self.gameplay.max_transcript_len);
        if let Ok(transcript) = &result {
            debug!(run_id, player_id = %caller, actions = transcript.len(), "action appended");
        }
        self.track(result)
    }

    /// Score the run, credit coins and refresh the caller's daily figure.
    ///
    /// A supplied transcript replaces the stored one.
    pub fn finish_run(
        &self,
        caller: &PlayerId,
        run_id: &str,
        transcript: Option<Vec<RunAction>>,
    ) -> ArcadeResult<FinishedRun> {
        let result = self.finish_run_inner(caller, run_id, transcript);
        self.track(result)
    }

    fn finish_run_inner(
        &self,
        caller: &PlayerId,
        run_id: &str,
        transcript: Option<Vec<RunAction>>,
    ) -> ArcadeResult<FinishedRun> {
        if let Some(actions) = &transcript {
            if actions.len() > self.gameplay.max_transcript_len {
                return Err(ArcadeError::InvalidInput(format!(
                    "transcript is limited to {} actions",
                    self.gameplay.max_transcript_len
                )));
            }
        }

        let finished_at = self.calendar.now();
        let settle = |run: &Run, already_awarded: u64| -> ArcadeResult<RunSettlement> {
            let transcript = transcript.clone().unwrap_or_else(|| run.transcript.clone());
            let seed = self.seeds.derive_seed(run.game, &run.date);
            let outcome = games::simulate(run.game, &seed, &transcript);
            Ok(RunSettlement {
                coins: rewards::award(run.game, outcome.score, already_awarded),
                score: outcome.score,
                transcript,
                finished_at,
            })
        };
        let run = match self.store.finalize_run(run_id, caller, &settle) {
            Ok(run) => run,
            Err(ArcadeError::RunAlreadyFinalized(_)) => return self.settled_result(caller, run_id),
            Err(e) => return Err(e),
        };

        info!(
            run_id,
            player_id = %caller,
            game = %run.game,
            date = %run.date,
            score = run.score,
            coins = run.coins,
            "run finalized"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_run_finished(run.game, run.coins);
        }

        // The run is already committed; a stale leaderboard heals on the
        // next finish for the same day.
        if let Err(e) = self.leaderboard.recompute(caller, run.game, &run.date) {
            warn!(run_id, player_id = %caller, error = %e, "leaderboard recompute failed");
        }

        Ok(FinishedRun {
            score: run.score,
            coins: run.coins,
            verified: run.verified,
        })
    }

    /// A repeated finish by the owner (e.g. a client retry after a timeout
    /// that still committed) gets the stored result back. The transcript
    /// sent with the retry is ignored.
    fn settled_result(&self, caller: &PlayerId, run_id: &str) -> ArcadeResult<FinishedRun> {
        match self.store.get_run(run_id)? {
            Some(run) if &run.player_id == caller && run.verified => {
                debug!(run_id, player_id = %caller, "run already finalized, returning stored result");
                Ok(FinishedRun {
                    score: run.score,
                    coins: run.coins,
                    verified: run.verified,
                })
            }
            Some(run) if &run.player_id == caller => {
                Err(ArcadeError::RunAlreadyFinalized(run_id.to_string()))
            }
            _ => Err(ArcadeError::RunNotFound(run_id.to_string())),
        }
    }

    pub fn leaderboard(
        &self,
        game: GameId,
        scope: Scope,
        caller: Option<&PlayerId>,
        friends_only: bool,
    ) -> ArcadeResult<LeaderboardView> {
        let result = self
            .leaderboard
            .rank(game, scope, &self.today(), caller, friends_only);
        self.track(result)
    }

    /// Publish a finished day's seed
    pub fn reveal_seed(&self, game: GameId, date: &str) -> ArcadeResult<RevealedSeed> {
        let result = parse_date(date)
            .ok_or_else(|| ArcadeError::InvalidInput(format!("invalid date '{}'", date)))
            .and_then(|date| {
                self.seeds
                    .reveal(game, date, self.calendar.today(), self.calendar.now())
            });
        self.track(result)
    }

    pub fn catalog(&self, caller: Option<&PlayerId>) -> ArcadeResult<Vec<CatalogEntry>> {
        let today = self.today();
        let result: ArcadeResult<Vec<CatalogEntry>> = GameId::ALL
            .iter()
            .map(|game| -> ArcadeResult<CatalogEntry> {
                let (runs_today, coins_today) = match caller {
                    Some(player) => (
                        Some(self.store.daily_runs(player, *game, &today)?.len()),
                        Some(self.store.coins_awarded(player, *game, &today)?),
                    ),
                    None => (None, None),
                };
                Ok(CatalogEntry {
                    id: *game,
                    title: game.title(),
                    description: game.description(),
                    rules: game.rules(),
                    runs_today,
                    coins_today,
                })
            })
            .collect();
        self.track(result)
    }

    pub fn profile(&self, caller: &PlayerId) -> ArcadeResult<Profile> {
        let result = self.profile_inner(caller);
        self.track(result)
    }

    fn profile_inner(&self, caller: &PlayerId) -> ArcadeResult<Profile> {
        let player = self.store.get_player(caller)?;
        let wallet = self.store.get_wallet(caller)?;
        let runs = self.store.player_runs(caller)?;

        let games = GameId::ALL
            .iter()
            .map(|game| {
                let verified: Vec<&Run> = runs
                    .iter()
                    .filter(|run| run.game == *game && run.verified)
                    .collect();
                GameStats {
                    game_id: *game,
                    runs_played: verified.len(),
                    best_score: verified
                        .iter()
                        .map(|run| run.score)
                        .max_by(|a, b| a.total_cmp(b)),
                    coins_earned: verified.iter().map(|run| run.coins).sum(),
                }
            })
            .collect();

        Ok(Profile {
            player_id: caller.clone(),
            display_name: player.map(|p| p.display_name),
            balance: wallet.map(|w| w.balance).unwrap_or(0),
            games,
        })
    }

    /// Create the caller's player record and opening wallet
    pub fn register_player(&self, caller: &PlayerId, display_name: &str) -> ArcadeResult<Profile> {
        let name = display_name.trim();
        if name.is_empty() || name.chars().count() > MAX_DISPLAY_NAME {
            return self.track(Err(ArcadeError::InvalidInput(format!(
                "display name must be 1-{} characters",
                MAX_DISPLAY_NAME
            ))));
        }

        let player = Player {
            id: caller.clone(),
            display_name: name.to_string(),
            created_at: self.calendar.now(),
        };
        let result = self
            .store
            .register_player(player, self.gameplay.starting_coins);
        if let Ok((player, wallet)) = &result {
            info!(player_id = %player.id, balance = wallet.balance, "player registered");
        }
        self.track(result)?;
        self.profile(caller)
    }

    pub fn add_friend(&self, caller: &PlayerId, friend_id: &str) -> ArcadeResult<()> {
        let result = PlayerId::parse(friend_id).and_then(|friend| {
            if &friend == caller {
                return Err(ArcadeError::InvalidInput(
                    "cannot befriend yourself".to_string(),
                ));
            }
            self.store.add_friend(caller, &friend)
        });
        self.track(result)
    }
}
