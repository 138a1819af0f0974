use chrono::Utc;
use clap::Parser;
use creditline::application::{CreditEngine, Deadline, spawn_settlement_pump};
use creditline::config::EngineConfig;
use creditline::domain::ports::{CreditScorerBox, Ledger};
use creditline::infrastructure::clock::{ManualClock, SystemClock};
use creditline::infrastructure::in_memory::InMemoryLedger;
#[cfg(feature = "storage-rocksdb")]
use creditline::infrastructure::rocksdb::RocksDBLedger;
use creditline::infrastructure::scoring::{FixedScorer, WeightedRandomScorer};
use creditline::interfaces::csv::command_reader::CommandReader;
use creditline::interfaces::csv::payment_writer::PaymentWriter;
use creditline::interfaces::scenario::ScenarioRunner;
use creditline::telemetry::init_tracing;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input scenario CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Engine configuration JSON file (optional)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Score every applicant with this fixed credit score instead of a random one
    #[arg(long)]
    score: Option<u16>,

    /// Run on the system clock, settling payments in the background as their
    /// delay elapses
    #[arg(long)]
    wall_clock: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// How often the background pump drains due notifications in wall-clock mode.
const PUMP_INTERVAL: Duration = Duration::from_millis(200);

fn open_ledger(db_path: Option<PathBuf>) -> Result<Ledger> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBLedger::open(path).into_diagnostic()?;
            Ok(Ledger::from_store(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Ledger::from_store(InMemoryLedger::new()))
        }
        None => Ok(Ledger::from_store(InMemoryLedger::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path).into_diagnostic()?,
        None => EngineConfig::default(),
    };
    let scorer: CreditScorerBox = match cli.score {
        Some(score) => Box::new(FixedScorer(score)),
        None => Box::new(WeightedRandomScorer::new()),
    };

    let ledger = open_ledger(cli.db_path)?;
    let (runner, pump) = if cli.wall_clock {
        let engine = CreditEngine::new(ledger, scorer, Arc::new(SystemClock), config)
            .into_diagnostic()?;
        let engine = Arc::new(engine);
        let pump = spawn_settlement_pump(Arc::clone(&engine), PUMP_INTERVAL);
        (ScenarioRunner::wall_clock(engine), Some(pump))
    } else {
        let clock = ManualClock::new(Utc::now());
        let engine = CreditEngine::new(ledger, scorer, Arc::new(clock.clone()), config)
            .into_diagnostic()?;
        (ScenarioRunner::new(Arc::new(engine), clock), None)
    };

    // Replay commands
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = runner.execute(command).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    if let Some(pump) = pump {
        pump.shutdown().await;
    }

    // Output final payments report
    let deadline = Deadline::within(runner.engine().config().request_timeout());
    let payments = runner
        .engine()
        .all_payment_details(&deadline)
        .await
        .into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = PaymentWriter::new(stdout.lock());
    writer.write_payments(&payments).into_diagnostic()?;

    Ok(())
}
