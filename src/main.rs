//! Concurrent Banking - demo driver
//!
//! ```text
//! ┌──────────┐    ┌─────────────────┐    ┌──────────────────────┐    ┌──────────┐
//! │  Config  │───▶│ Scripted phase  │───▶│ Load phase           │───▶│  Report  │
//! │  (YAML)  │    │ 1 thread/request│    │ N workers × M random │    │ + verify │
//! └──────────┘    └─────────────────┘    └──────────────────────┘    └──────────┘
//! ```
//!
//! Usage: `concurrent_banking [--env <name>] [--skip-load]`

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tracing::{info, warn};

use concurrent_banking::config::{AppConfig, SimulationConfig};
use concurrent_banking::logging::init_logging;
use concurrent_banking::{AccountId, Amount, TracingEventSink, TransferCoordinator};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn skip_load_phase() -> bool {
    std::env::args().any(|a| a == "--skip-load")
}

// ============================================================
// SCRIPTED PHASE
// ============================================================

/// One thread per request, as a caller would issue them
fn run_scripted(coordinator: &Arc<TransferCoordinator>) -> Result<()> {
    let requests: [(AccountId, AccountId, i64); 5] = [
        (1, 2, 100),
        (2, 3, 200),
        (3, 1, 50),
        (1, 1, 150),   // same account
        (3, 1, 50000), // insufficient funds
    ];

    let handles = requests
        .iter()
        .enumerate()
        .map(|(i, &(from, to, amount))| {
            let coordinator = coordinator.clone();
            thread::Builder::new()
                .name(format!("transfer-{}", i + 1))
                .spawn(move || coordinator.transfer(from, to, Decimal::from(amount)))
                .context("Failed to spawn transfer thread")
        })
        .collect::<Result<Vec<JoinHandle<bool>>>>()?;

    let mut committed = 0;
    for handle in handles {
        if handle.join().map_err(|_| anyhow!("transfer thread panicked"))? {
            committed += 1;
        }
    }
    info!(committed, requested = requests.len(), "Scripted phase done");
    Ok(())
}

// ============================================================
// LOAD PHASE
// ============================================================

/// Random transfers over every account pair from `workers` threads
fn run_load(coordinator: &Arc<TransferCoordinator>, sim: &SimulationConfig) -> Result<()> {
    let ids: Arc<Vec<AccountId>> = Arc::new(coordinator.account_ids().to_vec());
    if ids.len() < 2 {
        warn!("Load phase needs at least two accounts, skipping");
        return Ok(());
    }

    let start = Instant::now();
    let mut handles = Vec::with_capacity(sim.workers);
    for worker in 0..sim.workers {
        let coordinator = coordinator.clone();
        let ids = ids.clone();
        let sim = sim.clone();
        let handle = thread::Builder::new()
            .name(format!("worker-{}", worker))
            .spawn(move || {
                let mut rng = StdRng::seed_from_u64(sim.seed.wrapping_add(worker as u64));
                let mut committed = 0usize;
                for _ in 0..sim.transfers_per_worker {
                    let from = ids[rng.gen_range(0..ids.len())];
                    let to = ids[rng.gen_range(0..ids.len())];
                    let amount: Amount = Decimal::from(rng.gen_range(1..=sim.max_amount.max(1)));
                    if coordinator.transfer(from, to, amount) {
                        committed += 1;
                    }
                }
                committed
            })
            .context("Failed to spawn worker thread")?;
        handles.push(handle);
    }

    let mut committed = 0;
    for handle in handles {
        committed += handle.join().map_err(|_| anyhow!("worker thread panicked"))?;
    }

    let elapsed = start.elapsed();
    let attempted = sim.workers * sim.transfers_per_worker;
    info!(
        attempted,
        committed,
        elapsed_ms = elapsed.as_millis() as u64,
        "Load phase done"
    );
    Ok(())
}

// ============================================================
// REPORT
// ============================================================

fn log_balances(coordinator: &TransferCoordinator) -> Result<()> {
    for summary in coordinator.summaries()? {
        info!(
            account_id = summary.id,
            opening = %summary.opening_balance,
            transactions = summary.transactions,
            "Account balance {}: {:.2}",
            summary.id,
            summary.balance
        );
    }
    Ok(())
}

fn log_history(coordinator: &TransferCoordinator) -> Result<()> {
    for history in coordinator.history_report()? {
        if history.transactions.is_empty() {
            info!("No transactions found for Account {}.", history.account_id);
            continue;
        }
        info!(
            "Transaction history for Account {} ({} entries):",
            history.account_id,
            history.transactions.len()
        );
        for tx in &history.transactions {
            info!("\n{}", tx);
        }
    }
    Ok(())
}

fn dump_history(coordinator: &TransferCoordinator, dir: &str) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir))?;
    let path = Path::new(dir).join("history.json");
    let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer_pretty(file, &coordinator.history_report()?)?;
    info!(path = %path.display(), "History report written");
    Ok(())
}

fn verify(coordinator: &TransferCoordinator) -> Result<()> {
    coordinator.reconcile_all()?;
    let opening = coordinator.total_opening_balance()?;
    let closing = coordinator.total_balance()?;
    if opening != closing {
        bail!("Conservation violated: opening total {}, closing total {}", opening, closing);
    }
    info!(total = %closing, "Ledger verified: every account reconciles, total conserved");
    Ok(())
}

// ============================================================
// MAIN
// ============================================================

fn main() -> Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = init_logging(&app_config);

    info!("Starting concurrent banking demo in {} mode", env);

    let coordinator = Arc::new(TransferCoordinator::new(
        app_config.build_accounts(),
        Arc::new(TracingEventSink),
    )?);

    run_scripted(&coordinator)?;
    log_balances(&coordinator)?;
    log_history(&coordinator)?;

    if !skip_load_phase() {
        run_load(&coordinator, &app_config.simulation)?;
        log_balances(&coordinator)?;
    }

    dump_history(&coordinator, &app_config.log_dir)?;
    verify(&coordinator)?;
    info!("Stats: {}", coordinator.stats());
    Ok(())
}
