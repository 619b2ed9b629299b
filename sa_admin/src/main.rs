//! Admin command line for the sports academy tournament core.
//!
//! Each invocation runs one command against the configured store and prints
//! its result as JSON on stdout.

mod config;
mod logging;
mod metrics;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Error};
use log::info;
use pico_args::Arguments;
use serde::Serialize;
use serde_json::{Value, json};
use sports_academy::db::Database;
use sports_academy::{
    Academy, LogTelemetry, MemoryStore, MetricsTelemetry, ResultPayload, Store, Telemetry,
    TournamentConfig, TournamentState,
};

use crate::config::AdminConfig;

const HELP: &str = "\
Administer sports academy tournaments

USAGE:
  sa_admin [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
  migrate                              Apply database migrations
  create-tournament <JSON|FILE>        Create a tournament from a JSON config
  open <TOURNAMENT>                    Open enrollment
  start <TOURNAMENT>                   Start the tournament
  complete <TOURNAMENT>                Complete the tournament
  cancel <TOURNAMENT> --reason TEXT    Cancel and refund every active enrollment
  reset <TOURNAMENT> <STATE> --reason TEXT
                                       Admin reset (completed, rewards_distributed, cancelled)
  enroll <TOURNAMENT> <LICENSE>        Enroll a license
  withdraw <ENROLLMENT>                Withdraw an enrollment
  generate <TOURNAMENT> [--roster IDS] Generate sessions, roster defaults to active enrollments
  submit <SESSION> <JSON|FILE>         Submit a session result
  rankings <TOURNAMENT>                Current standings
  distribute <TOURNAMENT>              Distribute rewards
  balance <LICENSE>                    Credit balance
  history <LICENSE>                    Credit transactions
  purchase <LICENSE> <AMOUNT> [--reference REF]
                                       Add purchased credits
  demo                                 Play an 8-player group and knockout cup

OPTIONS:
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --metrics    IP:PORT     Serve Prometheus metrics    [default: env METRICS_BIND]
  --actor      NAME        Recorded in the audit trail [default: env ACADEMY_ACTOR]

FLAGS:
  --memory                 Use an in-process store instead of PostgreSQL
  -h, --help               Print help information

ENVIRONMENT:
  DATABASE_URL             PostgreSQL connection string
  RUST_LOG                 Log filter (default: info,sqlx=warn)
  (See .env.example for all configuration options)
";

/// Command line usage errors
#[derive(Debug, thiserror::Error)]
enum UsageError {
    #[error("no command given; run with --help")]
    MissingCommand,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("`migrate` needs a database; drop --memory")]
    MigrateInMemory,

    #[error("unexpected arguments: {0:?}")]
    Unexpected(Vec<std::ffi::OsString>),
}

struct Args {
    memory: bool,
    database_url: Option<String>,
    metrics: Option<std::net::SocketAddr>,
    actor: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let args = Args {
        memory: pargs.contains("--memory"),
        database_url: pargs.opt_value_from_str("--db-url")?,
        metrics: pargs.opt_value_from_str("--metrics")?,
        actor: pargs
            .opt_value_from_str("--actor")?
            .or_else(|| std::env::var("ACADEMY_ACTOR").ok()),
    };
    let command = pargs.subcommand()?.ok_or(UsageError::MissingCommand)?;

    logging::init();
    let config = AdminConfig::from_env(args.memory, args.database_url, args.metrics)?;

    let telemetry: Arc<dyn Telemetry> = match config.metrics_bind {
        Some(addr) => {
            metrics::init_metrics(addr).map_err(Error::msg)?;
            info!("Serving metrics at http://{addr}/metrics");
            Arc::new(MetricsTelemetry)
        }
        None => Arc::new(LogTelemetry),
    };

    let (store, database): (Arc<dyn Store>, Option<Database>) = match &config.database {
        Some(db_config) => {
            info!("Connecting to database");
            let db = Database::new(db_config)
                .await
                .context("Failed to connect to database")?;
            (Arc::new(db.store(config.academy.query_timeout)), Some(db))
        }
        None => {
            info!("Using in-memory store; nothing outlives this process");
            (Arc::new(MemoryStore::new()), None)
        }
    };

    let started = Instant::now();
    let result = match command.as_str() {
        "migrate" => match &database {
            Some(db) => {
                db.migrate().await.context("Failed to run migrations")?;
                Ok(json!({ "migrated": true }))
            }
            None => Err(UsageError::MigrateInMemory.into()),
        },
        _ => {
            let academy = Academy::new(config.academy, store, telemetry)?;
            run(&academy, &command, &mut pargs, args.actor.as_deref()).await
        }
    };

    let success = result.is_ok();
    logging::log_command(
        &command,
        args.actor.as_deref(),
        started.elapsed().as_millis() as u64,
        success,
    );
    metrics::command_total(&command, success);

    if let Some(db) = database {
        db.close().await;
    }

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Dispatch one academy command
async fn run(
    academy: &Academy,
    command: &str,
    pargs: &mut Arguments,
    actor: Option<&str>,
) -> Result<Value, Error> {
    // Options must be taken before free arguments.
    let reason: Option<String> = pargs.opt_value_from_str("--reason")?;
    let reference: Option<String> = pargs.opt_value_from_str("--reference")?;
    let roster: Option<String> = pargs.opt_value_from_str("--roster")?;

    let output = match command {
        "create-tournament" => {
            let config: TournamentConfig = read_json(&pargs.free_from_str::<String>()?)?;
            to_json(academy.create_tournament(config).await?)?
        }
        "open" => to_json(academy.open_enrollment(pargs.free_from_str()?, actor).await?)?,
        "start" => to_json(academy.start_tournament(pargs.free_from_str()?, actor).await?)?,
        "complete" => to_json(academy.complete_tournament(pargs.free_from_str()?, actor).await?)?,
        "cancel" => {
            let id = pargs.free_from_str()?;
            let reason = reason.unwrap_or_default();
            to_json(academy.cancel_tournament(id, &reason, actor).await?)?
        }
        "reset" => {
            let id = pargs.free_from_str()?;
            let target: TournamentState = pargs.free_from_str()?;
            let reason = reason.unwrap_or_default();
            to_json(academy.reset_tournament(id, target, &reason, actor).await?)?
        }
        "enroll" => {
            let tournament = pargs.free_from_str()?;
            let license = pargs.free_from_str()?;
            to_json(academy.enroll(tournament, license).await?)?
        }
        "withdraw" => to_json(academy.withdraw(pargs.free_from_str()?).await?)?,
        "generate" => {
            let tournament = pargs.free_from_str()?;
            let sessions = match roster {
                Some(list) => {
                    let roster = parse_roster(&list)?;
                    let format = academy.get_tournament(tournament).await?.format;
                    academy.generate_sessions(tournament, &roster, format).await?
                }
                None => academy.generate_for_enrolled(tournament).await?,
            };
            to_json(sessions)?
        }
        "submit" => {
            let session = pargs.free_from_str()?;
            let payload: ResultPayload = read_json(&pargs.free_from_str::<String>()?)?;
            to_json(academy.submit_result(session, &payload).await?)?
        }
        "rankings" => to_json(academy.get_rankings(pargs.free_from_str()?).await?)?,
        "distribute" => to_json(academy.distribute_rewards(pargs.free_from_str()?, actor).await?)?,
        "balance" => {
            let license = pargs.free_from_str()?;
            json!({ "license_id": license, "balance": academy.get_balance(license).await? })
        }
        "history" => to_json(academy.get_transaction_history(pargs.free_from_str()?).await?)?,
        "purchase" => {
            let license = pargs.free_from_str()?;
            let amount = pargs.free_from_str()?;
            to_json(academy.purchase_credits(license, amount, reference).await?)?
        }
        "demo" => to_json(demo(academy, actor).await?)?,
        other => return Err(UsageError::UnknownCommand(other.to_string()).into()),
    };

    let remaining = std::mem::replace(pargs, Arguments::from_vec(Vec::new())).finish();
    if !remaining.is_empty() {
        return Err(UsageError::Unexpected(remaining).into());
    }
    Ok(output)
}

/// Inline JSON, or a path to a JSON file
fn read_json<T: serde::de::DeserializeOwned>(arg: &str) -> Result<T, Error> {
    let text = if arg.trim_start().starts_with('{') {
        arg.to_string()
    } else {
        std::fs::read_to_string(arg).with_context(|| format!("Failed to read {arg}"))?
    };
    serde_json::from_str(&text).context("Invalid JSON")
}

fn to_json<T: Serialize>(value: T) -> Result<Value, Error> {
    Ok(serde_json::to_value(value)?)
}

fn parse_roster(list: &str) -> Result<Vec<i64>, Error> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().with_context(|| format!("Invalid license id {s:?}")))
        .collect()
}

#[derive(Debug, Serialize)]
struct DemoReport {
    tournament: sports_academy::Tournament,
    sessions_played: usize,
    rankings: Vec<sports_academy::StandingRow>,
    distribution: sports_academy::Distribution,
}

/// Eight licenses through a full group and knockout cup; the lower license
/// id wins every session
async fn demo(academy: &Academy, actor: Option<&str>) -> Result<DemoReport, Error> {
    let licenses: Vec<i64> = (1..=8).collect();
    for license in &licenses {
        academy.purchase_credits(*license, 200, None).await?;
    }

    let config = TournamentConfig::group_plus_knockout("Demo Cup".to_string(), 8, 100);
    let tournament = academy.create_tournament(config).await?;
    academy.open_enrollment(tournament.id, actor).await?;
    for license in &licenses {
        academy.enroll(tournament.id, *license).await?;
    }
    academy.start_tournament(tournament.id, actor).await?;
    academy.generate_for_enrolled(tournament.id).await?;

    let mut sessions_played = 0;
    loop {
        let ready: Vec<_> = academy
            .list_sessions(tournament.id)
            .await?
            .into_iter()
            .filter(|s| !s.finalized)
            .filter_map(|s| s.participants.map(|p| (s.id, p)))
            .collect();
        if ready.is_empty() {
            break;
        }
        for (id, p) in ready {
            let (winner, loser) = (p[0].min(p[1]), p[0].max(p[1]));
            academy
                .submit_result(id, &ResultPayload::head_to_head((winner, 2), (loser, 1)))
                .await?;
            sessions_played += 1;
        }
    }

    academy.complete_tournament(tournament.id, actor).await?;
    let rankings = academy.get_rankings(tournament.id).await?;
    let distribution = academy.distribute_rewards(tournament.id, actor).await?;
    Ok(DemoReport {
        tournament: academy.get_tournament(tournament.id).await?,
        sessions_played,
        rankings,
        distribution,
    })
}
