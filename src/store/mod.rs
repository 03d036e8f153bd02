//! Game records and the persistence boundary
//!
//! Key layout:
//!
//! ```text
//! seed:{game}:{date}                     -> DailySeedCommitment
//! run:{run_id}                           -> Run
//! runidx:{player}:{game}:{date}:{run_id} -> ""
//! coins:{player}:{game}:{date}           -> u64
//! wallet:{player}                        -> Wallet
//! agg:{game}:{date}:{player}             -> LeaderboardAggregate
//! player:{player}                        -> Player
//! friend:{player}:{friend}               -> ""
//! ```
//!
//! Dates are `YYYY-MM-DD`, so a prefix scan walks them in calendar order.

pub mod memory;

use crate::{
    errors::{ArcadeError, ArcadeResult, StorageError},
    games::{GameId, RunAction},
    storage::{KvStore, KvTxn, RocksStorage},
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

pub use memory::MemoryKv;

pub type RocksGameStore = KvGameStore<RocksStorage>;
pub type MemoryGameStore = KvGameStore<MemoryKv>;

/// Opaque player identifier supplied by the account subsystem
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub const MAX_LEN: usize = 128;

    /// Accepts 1..=128 characters, no `:` (the key separator) and no
    /// control characters.
    pub fn parse(raw: &str) -> ArcadeResult<Self> {
        if raw.is_empty() || raw.chars().count() > Self::MAX_LEN {
            return Err(ArcadeError::InvalidInput(format!(
                "player id must be 1-{} characters",
                Self::MAX_LEN
            )));
        }
        if raw.chars().any(|c| c == ':' || c.is_control()) {
            return Err(ArcadeError::InvalidInput(
                "player id contains reserved characters".to_string(),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public commitment to one day's seed for one game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySeedCommitment {
    pub game: GameId,
    pub date: String,
    pub seed_hash: String,
    pub revealed_seed: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub id: String,
    pub player_id: PlayerId,
    pub game: GameId,
    pub date: String,
    pub transcript: Vec<RunAction>,
    pub score: f64,
    pub coins: u64,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(
        id: String,
        player_id: PlayerId,
        game: GameId,
        date: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            player_id,
            game,
            date,
            transcript: Vec::new(),
            score: 0.0,
            coins: 0,
            verified: false,
            created_at,
            finished_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wallet {
    pub player_id: PlayerId,
    pub balance: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardAggregate {
    pub game: GameId,
    pub date: String,
    pub player_id: PlayerId,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of replaying a run, written by [`GameStore::finalize_run`]
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettlement {
    pub transcript: Vec<RunAction>,
    pub score: f64,
    pub coins: u64,
    pub finished_at: DateTime<Utc>,
}

/// Persistence operations the service relies on
pub trait GameStore: Send + Sync {
    /// Return the stored commitment for its (game, date), creating it from
    /// `candidate` if none exists yet. Concurrent callers converge on one row.
    fn get_or_create_commitment(
        &self,
        candidate: DailySeedCommitment,
    ) -> ArcadeResult<DailySeedCommitment>;

    fn get_commitment(&self, game: GameId, date: &str)
        -> ArcadeResult<Option<DailySeedCommitment>>;

    fn record_revealed_seed(
        &self,
        game: GameId,
        date: &str,
        seed: &str,
    ) -> ArcadeResult<DailySeedCommitment>;

    fn insert_run(&self, run: &Run) -> ArcadeResult<()>;

    fn get_run(&self, run_id: &str) -> ArcadeResult<Option<Run>>;

    /// Append to an unverified run owned by `caller`; returns the transcript.
    fn append_action(
        &self,
        run_id: &str,
        caller: &PlayerId,
        action: RunAction,
        max_len: usize,
    ) -> ArcadeResult<Vec<RunAction>>;

    /// Finalize an unverified run owned by `caller`.
    ///
    /// `settle` receives the stored run and the coins already awarded to
    /// the owner for that game and day. The run, the wallet credit and the
    /// daily coin counter are written in one transaction.
    fn finalize_run(
        &self,
        run_id: &str,
        caller: &PlayerId,
        settle: &dyn Fn(&Run, u64) -> ArcadeResult<RunSettlement>,
    ) -> ArcadeResult<Run>;

    /// Runs a player started for one game and day
    fn daily_runs(&self, player: &PlayerId, game: GameId, date: &str) -> ArcadeResult<Vec<Run>>;

    /// Every run a player ever started
    fn player_runs(&self, player: &PlayerId) -> ArcadeResult<Vec<Run>>;

    fn coins_awarded(&self, player: &PlayerId, game: GameId, date: &str) -> ArcadeResult<u64>;

    /// Insert or replace the aggregate for its (game, date, player)
    fn put_aggregate(&self, aggregate: &LeaderboardAggregate) -> ArcadeResult<()>;

    fn daily_aggregates(&self, game: GameId, date: &str)
        -> ArcadeResult<Vec<LeaderboardAggregate>>;

    /// Aggregates for a game across every date
    fn game_aggregates(&self, game: GameId) -> ArcadeResult<Vec<LeaderboardAggregate>>;

    fn get_player(&self, player: &PlayerId) -> ArcadeResult<Option<Player>>;

    /// Create or rename a player; a wallet with `starting_coins` is opened
    /// only if the player has none.
    fn register_player(&self, player: Player, starting_coins: u64)
        -> ArcadeResult<(Player, Wallet)>;

    fn get_wallet(&self, player: &PlayerId) -> ArcadeResult<Option<Wallet>>;

    fn add_friend(&self, player: &PlayerId, friend: &PlayerId) -> ArcadeResult<()>;

    fn friends_of(&self, player: &PlayerId) -> ArcadeResult<Vec<PlayerId>>;
}

fn seed_key(game: GameId, date: &str) -> String {
    format!("seed:{}:{}", game, date)
}

fn run_key(run_id: &str) -> String {
    format!("run:{}", run_id)
}

fn run_index_key(player: &PlayerId, game: GameId, date: &str, run_id: &str) -> String {
    format!("runidx:{}:{}:{}:{}", player, game, date, run_id)
}

fn coins_key(player: &PlayerId, game: GameId, date: &str) -> String {
    format!("coins:{}:{}:{}", player, game, date)
}

fn wallet_key(player: &PlayerId) -> String {
    format!("wallet:{}", player)
}

fn aggregate_key(game: GameId, date: &str, player: &PlayerId) -> String {
    format!("agg:{}:{}:{}", game, date, player)
}

fn player_key(player: &PlayerId) -> String {
    format!("player:{}", player)
}

fn friend_key(player: &PlayerId, friend: &PlayerId) -> String {
    format!("friend:{}:{}", player, friend)
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value)
        .map_err(|e| StorageError::WriteFailed(format!("encode {}: {}", key, e)))
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes)
        .map_err(|e| StorageError::CorruptedData(format!("{}: {}", key, e)))
}

fn txn_read<T: DeserializeOwned>(txn: &mut dyn KvTxn, key: &str) -> ArcadeResult<Option<T>> {
    match txn.get_for_update(key)? {
        Some(bytes) => Ok(Some(decode(key, &bytes)?)),
        None => Ok(None),
    }
}

fn txn_write<T: Serialize>(txn: &mut dyn KvTxn, key: &str, value: &T) -> ArcadeResult<()> {
    txn.put(key, encode(key, value)?)?;
    Ok(())
}

/// Run that exists and belongs to `caller`. Someone else's run is reported
/// exactly like a missing one.
fn owned_run(txn: &mut dyn KvTxn, run_id: &str, caller: &PlayerId) -> ArcadeResult<Run> {
    match txn_read::<Run>(txn, &run_key(run_id))? {
        Some(run) if &run.player_id == caller => Ok(run),
        _ => Err(ArcadeError::RunNotFound(run_id.to_string())),
    }
}

/// [`GameStore`] over any [`KvStore`] backend
pub struct KvGameStore<K> {
    kv: K,
}

impl<K: KvStore> KvGameStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> ArcadeResult<Option<T>> {
        match self.kv.get(key)? {
            Some(bytes) => Ok(Some(decode(key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> ArcadeResult<()> {
        self.kv.put(key, encode(key, value)?)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, prefix: &str) -> ArcadeResult<Vec<T>> {
        self.kv
            .scan_prefix(prefix)?
            .into_iter()
            .map(|(key, bytes)| decode(&key, &bytes).map_err(ArcadeError::from))
            .collect()
    }

    /// Trailing key segment of every entry under `prefix`
    fn scan_suffixes(&self, prefix: &str) -> ArcadeResult<Vec<String>> {
        Ok(self
            .kv
            .scan_prefix(prefix)?
            .into_iter()
            .filter_map(|(key, _)| key.rsplit(':').next().map(str::to_string))
            .collect())
    }

    fn runs_by_ids(&self, ids: Vec<String>) -> ArcadeResult<Vec<Run>> {
        let mut runs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(run) = self.read::<Run>(&run_key(&id))? {
                runs.push(run);
            }
        }
        Ok(runs)
    }
}

impl KvGameStore<MemoryKv> {
    pub fn in_memory() -> Self {
        Self::new(MemoryKv::new())
    }
}

impl<K: KvStore> GameStore for KvGameStore<K> {
    fn get_or_create_commitment(
        &self,
        candidate: DailySeedCommitment,
    ) -> ArcadeResult<DailySeedCommitment> {
        let key = seed_key(candidate.game, &candidate.date);
        self.kv.transact(|txn| {
            if let Some(existing) = txn_read::<DailySeedCommitment>(txn, &key)? {
                return Ok(existing);
            }
            txn_write(txn, &key, &candidate)?;
            Ok(candidate.clone())
        })
    }

    fn get_commitment(
        &self,
        game: GameId,
        date: &str,
    ) -> ArcadeResult<Option<DailySeedCommitment>> {
        self.read(&seed_key(game, date))
    }

    fn record_revealed_seed(
        &self,
        game: GameId,
        date: &str,
        seed: &str,
    ) -> ArcadeResult<DailySeedCommitment> {
        let key = seed_key(game, date);
        self.kv.transact(|txn| {
            let mut commitment = txn_read::<DailySeedCommitment>(txn, &key)?.ok_or_else(|| {
                StorageError::CorruptedData(format!("{} vanished before reveal", key))
            })?;
            if commitment.revealed_seed.is_none() {
                commitment.revealed_seed = Some(seed.to_string());
                txn_write(txn, &key, &commitment)?;
            }
            Ok(commitment)
        })
    }

    fn insert_run(&self, run: &Run) -> ArcadeResult<()> {
        self.kv.transact(|txn| {
            txn_write(txn, &run_key(&run.id), run)?;
            txn.put(
                &run_index_key(&run.player_id, run.game, &run.date, &run.id),
                Vec::new(),
            )?;
            Ok(())
        })
    }

    fn get_run(&self, run_id: &str) -> ArcadeResult<Option<Run>> {
        self.read(&run_key(run_id))
    }

    fn append_action(
        &self,
        run_id: &str,
        caller: &PlayerId,
        action: RunAction,
        max_len: usize,
    ) -> ArcadeResult<Vec<RunAction>> {
        self.kv.transact(|txn| {
            let mut run = owned_run(txn, run_id, caller)?;
            if run.verified {
                return Err(ArcadeError::RunAlreadyFinalized(run_id.to_string()));
            }
            if run.transcript.len() >= max_len {
                return Err(ArcadeError::InvalidInput(format!(
                    "transcript is limited to {} actions",
                    max_len
                )));
            }
            run.transcript.push(action.clone());
            txn_write(txn, &run_key(run_id), &run)?;
            Ok(run.transcript)
        })
    }

    fn finalize_run(
        &self,
        run_id: &str,
        caller: &PlayerId,
        settle: &dyn Fn(&Run, u64) -> ArcadeResult<RunSettlement>,
    ) -> ArcadeResult<Run> {
        self.kv.transact(|txn| {
            let mut run = owned_run(txn, run_id, caller)?;
            if run.verified {
                return Err(ArcadeError::RunAlreadyFinalized(run_id.to_string()));
            }

            let counter_key = coins_key(&run.player_id, run.game, &run.date);
            let already: u64 = txn_read(txn, &counter_key)?.unwrap_or(0);
            let settlement = settle(&run, already)?;

            let wallet_key = wallet_key(&run.player_id);
            let mut wallet = txn_read::<Wallet>(txn, &wallet_key)?.unwrap_or_else(|| Wallet {
                player_id: run.player_id.clone(),
                balance: 0,
            });
            wallet.balance = wallet.balance.saturating_add(settlement.coins);

            run.transcript = settlement.transcript;
            run.score = settlement.score;
            run.coins = settlement.coins;
            run.verified = true;
            run.finished_at = Some(settlement.finished_at);

            txn_write(txn, &run_key(run_id), &run)?;
            txn_write(txn, &wallet_key, &wallet)?;
            txn_write(txn, &counter_key, &already.saturating_add(settlement.coins))?;
            Ok(run)
        })
    }

    fn daily_runs(&self, player: &PlayerId, game: GameId, date: &str) -> ArcadeResult<Vec<Run>> {
        let ids = self.scan_suffixes(&format!("runidx:{}:{}:{}:", player, game, date))?;
        self.runs_by_ids(ids)
    }

    fn player_runs(&self, player: &PlayerId) -> ArcadeResult<Vec<Run>> {
        let ids = self.scan_suffixes(&format!("runidx:{}:", player))?;
        self.runs_by_ids(ids)
    }

    fn coins_awarded(&self, player: &PlayerId, game: GameId, date: &str) -> ArcadeResult<u64> {
        Ok(self.read(&coins_key(player, game, date))?.unwrap_or(0))
    }

    fn put_aggregate(&self, aggregate: &LeaderboardAggregate) -> ArcadeResult<()> {
        self.write(
            &aggregate_key(aggregate.game, &aggregate.date, &aggregate.player_id),
            aggregate,
        )
    }

    fn daily_aggregates(
        &self,
        game: GameId,
        date: &str,
    ) -> ArcadeResult<Vec<LeaderboardAggregate>> {
        self.scan(&format!("agg:{}:{}:", game, date))
    }

    fn game_aggregates(&self, game: GameId) -> ArcadeResult<Vec<LeaderboardAggregate>> {
        self.scan(&format!("agg:{}:", game))
    }

    fn get_player(&self, player: &PlayerId) -> ArcadeResult<Option<Player>> {
        self.read(&player_key(player))
    }

    fn register_player(
        &self,
        player: Player,
        starting_coins: u64,
    ) -> ArcadeResult<(Player, Wallet)> {
        let player_key = player_key(&player.id);
        let wallet_key = wallet_key(&player.id);
        self.kv.transact(|txn| {
            let stored = match txn_read::<Player>(txn, &player_key)? {
                Some(existing) => Player {
                    display_name: player.display_name.clone(),
                    ..existing
                },
                None => player.clone(),
            };
            txn_write(txn, &player_key, &stored)?;

            let wallet = match txn_read::<Wallet>(txn, &wallet_key)? {
                Some(wallet) => wallet,
                None => {
                    let wallet = Wallet {
                        player_id: player.id.clone(),
                        balance: starting_coins,
                    };
                    txn_write(txn, &wallet_key, &wallet)?;
                    wallet
                }
            };
            Ok((stored, wallet))
        })
    }

    fn get_wallet(&self, player: &PlayerId) -> ArcadeResult<Option<Wallet>> {
        self.read(&wallet_key(player))
    }

    fn add_friend(&self, player: &PlayerId, friend: &PlayerId) -> ArcadeResult<()> {
        self.kv.put(&friend_key(player, friend), Vec::new())?;
        Ok(())
    }

    fn friends_of(&self, player: &PlayerId) -> ArcadeResult<Vec<PlayerId>> {
        Ok(self
            .scan_suffixes(&format!("friend:{}:", player))?
            .into_iter()
            .map(PlayerId)
            .collect())
    }
}
