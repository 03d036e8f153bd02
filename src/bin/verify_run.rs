//! Offline run verification
//!
//! Replays a recorded transcript against a revealed seed (or the server
//! secret and a date) and prints the score the server must have awarded.

use clap::Parser;
use dailyrun::{
    config::SecretKey,
    fairness::{commitment_hash, SeedKey},
    games::{self, GameId, RunAction},
    time::{format_date, parse_date},
};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "verify-run")]
#[command(about = "Replay a daily run transcript", long_about = None)]
struct Args {
    /// Game identifier (crash, mines, plinko, blackjack, roulette)
    game: String,

    /// JSON file holding the transcript array
    transcript: PathBuf,

    /// Revealed seed for the run's day
    #[arg(long, conflicts_with = "secret")]
    seed: Option<String>,

    /// Server secret; derives the seed together with --date
    #[arg(long, requires = "date")]
    secret: Option<String>,

    /// Civil date of the run (YYYY-MM-DD)
    #[arg(long)]
    date: Option<String>,

    /// Published commitment the seed must hash to
    #[arg(long)]
    expect_hash: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let game: GameId = args.game.parse()?;

    let seed = match (&args.seed, &args.secret) {
        (Some(seed), _) => seed.clone(),
        (None, Some(secret)) => {
            let raw_date = args.date.as_deref().unwrap_or_default();
            let date = parse_date(raw_date)
                .ok_or_else(|| format!("invalid date '{}'", raw_date))?;
            SeedKey::new(&SecretKey::new(secret.as_str()))?.derive(game, &format_date(date))
        }
        (None, None) => return Err("either --seed or --secret with --date is required".into()),
    };

    let seed_hash = commitment_hash(&seed);
    if let Some(expected) = &args.expect_hash {
        if !expected.eq_ignore_ascii_case(&seed_hash) {
            return Err(format!(
                "seed does not match commitment: expected {}, got {}",
                expected, seed_hash
            )
            .into());
        }
    }

    let raw = std::fs::read_to_string(&args.transcript)?;
    let values: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
    let transcript = RunAction::transcript_from_values(values);

    let result = games::simulate(game, &seed, &transcript);
    let report = json!({
        "gameId": game,
        "seedHash": seed_hash,
        "actions": transcript.len(),
        "score": result.score,
        "details": result.details,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
