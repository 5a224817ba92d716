//! Bank Ledger service
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌──────────────┐
//! │  Config  │───▶│ Ledger Store │───▶│   Gateway    │
//! │  (YAML)  │    │ (PG / memory)│    │ (axum, JWT)  │
//! └──────────┘    └──────────────┘    └──────────────┘
//! ```

use std::sync::Arc;

use clap::Parser;

use bank_ledger::config::AppConfig;
use bank_ledger::db::Database;
use bank_ledger::gateway::{self, state::AppState};
use bank_ledger::logging::init_logging;
use bank_ledger::money::Money;
use bank_ledger::store::{LedgerStore, MemoryLedgerStore, PgLedgerStore};
use bank_ledger::SystemClock;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config environment, loads config/{env}.yaml
    #[arg(short, long, default_value = "dev")]
    env: String,

    /// Override gateway.port
    #[arg(long)]
    port: Option<u16>,

    /// Ignore postgres_url and run on the in-memory store
    #[arg(long)]
    memory: bool,

    /// With the in-memory store: open two demo accounts (owners 1 and 2)
    #[arg(long, requires = "memory")]
    seed_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(&args.env)?;
    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    let _log_guard = init_logging(&config)?;

    tracing::info!(
        env = %args.env,
        version = env!("GIT_HASH"),
        "Starting bank_ledger"
    );

    let state = match config.postgres_url.as_deref().filter(|_| !args.memory) {
        Some(url) => {
            let db = Arc::new(Database::connect(url, &config.ledger).await?);
            db.migrate().await?;
            let store: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(
                db.pool().clone(),
                Arc::new(SystemClock),
                config.ledger.lock_timeout(),
            ));
            AppState::new(store, &config.auth.jwt_secret).with_database(db)
        }
        None => {
            tracing::warn!("No PostgreSQL configured, using the in-memory ledger (data is lost on exit)");
            let store = MemoryLedgerStore::new().with_lock_timeout(config.ledger.lock_timeout());
            if args.seed_demo {
                for (owner, number, balance) in [(1, "ACC-0001", "100.00"), (2, "ACC-0002", "50.00")] {
                    let account = store.open_account(owner, number, Money::parse(balance)?)?;
                    tracing::info!(
                        id = account.id,
                        account_number = %account.account_number,
                        owner_id = owner,
                        balance = %account.balance,
                        "Demo account opened"
                    );
                }
            }
            AppState::new(Arc::new(store), &config.auth.jwt_secret)
        }
    };

    gateway::run_server(&config.gateway, Arc::new(state)).await
}
