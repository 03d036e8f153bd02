//! RocksDB-backed store: persistence and concurrent writers

use chrono::Utc;
use dailyrun::{
    config::StorageConfig,
    errors::ArcadeError,
    games::{GameId, RunAction},
    storage::RocksStorage,
    store::{DailySeedCommitment, GameStore, KvGameStore, PlayerId, Run, RunSettlement},
};
use std::{path::Path, thread};
use tempfile::TempDir;

fn open(path: &Path) -> KvGameStore<RocksStorage> {
    KvGameStore::new(RocksStorage::open_at(path, &StorageConfig::default()).unwrap())
}

fn player(id: &str) -> PlayerId {
    PlayerId::parse(id).unwrap()
}

fn candidate(hash: &str) -> DailySeedCommitment {
    DailySeedCommitment {
        game: GameId::Crash,
        date: "2024-05-01".to_string(),
        seed_hash: hash.to_string(),
        revealed_seed: None,
        created_at: Utc::now(),
    }
}

#[test]
fn test_concurrent_commitments_converge() {
    let dir = TempDir::new().unwrap();
    let store = open(dir.path());

    let stored: Vec<DailySeedCommitment> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = &store;
                s.spawn(move || {
                    store
                        .get_or_create_commitment(candidate(&format!("hash-{}", i)))
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = &stored[0].seed_hash;
    assert!(stored.iter().all(|c| &c.seed_hash == first));
    assert_eq!(
        store
            .get_commitment(GameId::Crash, "2024-05-01")
            .unwrap()
            .unwrap()
            .seed_hash,
        *first
    );
}

#[test]
fn test_finalize_happens_once_under_contention() {
    let dir = TempDir::new().unwrap();
    let store = open(dir.path());
    let alice = player("alice");
    let run = Run::new(
        "run-1".to_string(),
        alice.clone(),
        GameId::Mines,
        "2024-05-01".to_string(),
        Utc::now(),
    );
    store.insert_run(&run).unwrap();

    let settle = |run: &Run, _already: u64| -> Result<RunSettlement, ArcadeError> {
        Ok(RunSettlement {
            transcript: run.transcript.clone(),
            score: 5.0,
            coins: 10,
            finished_at: Utc::now(),
        })
    };

    let results: Vec<Result<Run, ArcadeError>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (store, alice, settle) = (&store, &alice, &settle);
                s.spawn(move || store.finalize_run("run-1", alice, settle))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let finalized = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(finalized, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, ArcadeError::RunAlreadyFinalized(_))));

    assert_eq!(store.get_wallet(&alice).unwrap().unwrap().balance, 10);
    assert_eq!(
        store.coins_awarded(&alice, GameId::Mines, "2024-05-01").unwrap(),
        10
    );
}

#[test]
fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let alice = player("alice");

    {
        let store = open(dir.path());
        let run = Run::new(
            "run-persisted".to_string(),
            alice.clone(),
            GameId::Roulette,
            "2024-05-01".to_string(),
            Utc::now(),
        );
        store.insert_run(&run).unwrap();
        store
            .append_action("run-persisted", &alice, RunAction::new("spin", 0.0), 256)
            .unwrap();
        store.get_or_create_commitment(candidate("abc")).unwrap();
    }

    let store = open(dir.path());
    let run = store.get_run("run-persisted").unwrap().unwrap();
    assert_eq!(run.transcript.len(), 1);
    assert!(!run.verified);
    assert_eq!(
        store
            .daily_runs(&alice, GameId::Roulette, "2024-05-01")
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        store
            .get_commitment(GameId::Crash, "2024-05-01")
            .unwrap()
            .unwrap()
            .seed_hash,
        "abc"
    );
}
