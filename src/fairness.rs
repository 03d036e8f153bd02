//! Seed commitments
//!
//! A day's seed is `HMAC-SHA256(secret, "{game}:{date}:default")`. Only
//! `SHA-256(seed)` is published while the day is running; the seed itself
//! can be revealed once the day is over so anyone can replay their runs.

use crate::{
    config::SecretKey,
    errors::{ArcadeError, ArcadeResult, ConfigurationError, StorageError},
    games::GameId,
    store::{DailySeedCommitment, GameStore},
    time::format_date,
};
use chrono::{DateTime, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Public commitment for a seed string
pub fn commitment_hash(seed: &str) -> String {
    hex::encode(Sha256::digest(seed.as_bytes()))
}

/// Seed and the commitment it was checked against
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RevealedSeed {
    pub game_id: GameId,
    pub date: String,
    pub seed: String,
    pub seed_hash: String,
}

/// Keyed seed derivation, usable without a store
#[derive(Clone)]
pub struct SeedKey {
    mac: HmacSha256,
}

impl SeedKey {
    pub fn new(secret: &SecretKey) -> Result<Self, ConfigurationError> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
            ConfigurationError::InvalidValue {
                field: "fairness.secret_key".to_string(),
                value: "<redacted>".to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { mac })
    }

    pub fn derive(&self, game: GameId, date: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(format!("{}:{}:default", game, date).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Derives daily seeds from the process secret and owns their commitments
pub struct SeedAuthority {
    key: SeedKey,
    store: Arc<dyn GameStore>,
}

impl SeedAuthority {
    pub fn new(secret: &SecretKey, store: Arc<dyn GameStore>) -> Result<Self, ConfigurationError> {
        Ok(Self {
            key: SeedKey::new(secret)?,
            store,
        })
    }

    /// Secret seed for (game, date). Never leaves the server before the
    /// day is over.
    pub fn derive_seed(&self, game: GameId, date: &str) -> String {
        self.key.derive(game, date)
    }

    /// Idempotent get-or-create of the day's commitment
    pub fn commit_seed(
        &self,
        game: GameId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> ArcadeResult<DailySeedCommitment> {
        let date = format_date(date);
        if let Some(existing) = self.store.get_commitment(game, &date)? {
            return Ok(existing);
        }

        let seed_hash = commitment_hash(&self.derive_seed(game, &date));
        let commitment = self.store.get_or_create_commitment(DailySeedCommitment {
            game,
            date: date.clone(),
            seed_hash: seed_hash.clone(),
            revealed_seed: None,
            created_at: now,
        })?;

        if commitment.seed_hash == seed_hash {
            debug!(%game, %date, "seed commitment ready");
        } else {
            warn!(%game, %date, "stored commitment does not match the configured secret");
        }
        Ok(commitment)
    }

    /// Reveal a past day's seed after checking it against its commitment
    pub fn reveal(
        &self,
        game: GameId,
        date: NaiveDate,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> ArcadeResult<RevealedSeed> {
        if date >= today {
            return Err(ArcadeError::SeedNotRevealable {
                game: game.to_string(),
                date: format_date(date),
            });
        }

        let commitment = self.commit_seed(game, date, now)?;
        let seed = self.derive_seed(game, &commitment.date);
        if commitment_hash(&seed) != commitment.seed_hash {
            return Err(StorageError::CorruptedData(format!(
                "commitment for {} on {} does not match derived seed",
                game, commitment.date
            ))
            .into());
        }

        if commitment.revealed_seed.is_none() {
            self.store
                .record_revealed_seed(game, &commitment.date, &seed)?;
            info!(%game, date = %commitment.date, "seed revealed");
        }

        Ok(RevealedSeed {
            game_id: game,
            date: commitment.date,
            seed_hash: commitment.seed_hash,
            seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::MemoryGameStore, time::parse_date};

    fn authority(secret: &str) -> SeedAuthority {
        SeedAuthority::new(
            &SecretKey::new(secret),
            Arc::new(MemoryGameStore::in_memory()),
        )
        .unwrap()
    }

    fn date(raw: &str) -> NaiveDate {
        parse_date(raw).unwrap()
    }

    #[test]
    fn test_known_derivation() {
        let seed = authority("test-secret").derive_seed(GameId::Crash, "2024-01-15");
        assert_eq!(
            seed,
            "1d3fba156bfeb1050704fecb3891b9e92a9bb0a460d24f0247ccf3823069e41c"
        );
        assert_eq!(
            commitment_hash(&seed),
            "2fb6224dfc6e8dc26fb1dec7c903b00d0a5d6066fbcf5bec897c4bd7b4bc54a0"
        );
    }

    #[test]
    fn test_seed_depends_on_all_inputs() {
        let a = authority("k1");
        let b = authority("k2");
        let base = a.derive_seed(GameId::Mines, "2024-01-15");
        assert_eq!(base, a.derive_seed(GameId::Mines, "2024-01-15"));
        assert_ne!(base, a.derive_seed(GameId::Crash, "2024-01-15"));
        assert_ne!(base, a.derive_seed(GameId::Mines, "2024-01-16"));
        assert_ne!(base, b.derive_seed(GameId::Mines, "2024-01-15"));
    }

    #[test]
    fn test_commit_is_idempotent() {
        let authority = authority("k");
        let first = authority
            .commit_seed(GameId::Plinko, date("2024-02-01"), Utc::now())
            .unwrap();
        let second = authority
            .commit_seed(GameId::Plinko, date("2024-02-01"), Utc::now())
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.seed_hash,
            commitment_hash(&authority.derive_seed(GameId::Plinko, "2024-02-01"))
        );
        assert!(first.revealed_seed.is_none());
    }

    #[test]
    fn test_today_cannot_be_revealed() {
        let authority = authority("k");
        let today = date("2024-02-02");
        for day in [today, date("2024-02-03")] {
            assert!(matches!(
                authority.reveal(GameId::Crash, day, today, Utc::now()),
                Err(ArcadeError::SeedNotRevealable { .. })
            ));
        }
    }

    #[test]
    fn test_past_seed_reveal_matches_commitment() {
        let authority = authority("k");
        let day = date("2024-02-01");
        let committed = authority
            .commit_seed(GameId::Roulette, day, Utc::now())
            .unwrap();
        let revealed = authority
            .reveal(GameId::Roulette, day, date("2024-02-02"), Utc::now())
            .unwrap();
        assert_eq!(revealed.seed_hash, committed.seed_hash);
        assert_eq!(commitment_hash(&revealed.seed), committed.seed_hash);

        let stored = authority
            .store
            .get_commitment(GameId::Roulette, "2024-02-01")
            .unwrap()
            .unwrap();
        assert_eq!(stored.revealed_seed, Some(revealed.seed));
    }
}
