//! Prometheus counters for run activity

use crate::{errors::ArcadeError, games::GameId};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub struct ArcadeMetrics {
    registry: Registry,
    runs_started: IntCounterVec,
    runs_finished: IntCounterVec,
    coins_awarded: IntCounterVec,
    errors: IntCounterVec,
}

impl ArcadeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let runs_started = IntCounterVec::new(
            Opts::new("dailyrun_runs_started_total", "Runs opened"),
            &["game"],
        )?;
        let runs_finished = IntCounterVec::new(
            Opts::new("dailyrun_runs_finished_total", "Runs verified and scored"),
            &["game"],
        )?;
        let coins_awarded = IntCounterVec::new(
            Opts::new("dailyrun_coins_awarded_total", "Coins credited to wallets"),
            &["game"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new("dailyrun_errors_total", "Failed service operations"),
            &["kind"],
        )?;

        registry.register(Box::new(runs_started.clone()))?;
        registry.register(Box::new(runs_finished.clone()))?;
        registry.register(Box::new(coins_awarded.clone()))?;
        registry.register(Box::new(errors.clone()))?;

        Ok(Self {
            registry,
            runs_started,
            runs_finished,
            coins_awarded,
            errors,
        })
    }

    pub fn record_run_started(&self, game: GameId) {
        self.runs_started.with_label_values(&[game.as_str()]).inc();
    }

    pub fn record_run_finished(&self, game: GameId, coins: u64) {
        self.runs_finished.with_label_values(&[game.as_str()]).inc();
        self.coins_awarded
            .with_label_values(&[game.as_str()])
            .inc_by(coins);
    }

    pub fn record_error(&self, error: &ArcadeError) {
        self.errors.with_label_values(&[error.kind()]).inc();
    }

    /// Text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
