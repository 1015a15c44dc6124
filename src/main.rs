use clap::Parser;
use ledger_engine::application::context::Context;
use ledger_engine::application::ledger::Ledger;
use ledger_engine::config::LedgerConfig;
use ledger_engine::domain::ports::LedgerStoreRef;
use ledger_engine::infrastructure::in_memory::InMemoryLedgerStore;
use ledger_engine::interfaces::csv::account_writer::AccountWriter;
use ledger_engine::interfaces::csv::command_reader::{CommandReader, LedgerCommand};
use ledger_engine::logging::init_logging;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input ledger commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// YAML configuration file (optional)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum time to wait for an account row lock, in milliseconds
    #[arg(long, env = "LEDGER_LOCK_TIMEOUT_MS")]
    lock_timeout_ms: Option<u64>,
}

fn open_store(db_path: Option<PathBuf>, config: &LedgerConfig) -> Result<LedgerStoreRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            use ledger_engine::infrastructure::rocksdb::RocksDBStore;
            let store = RocksDBStore::open_with_lock_timeout(path, config.lock_timeout())
                .into_diagnostic()?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryLedgerStore::with_lock_timeout(
                config.lock_timeout(),
            )))
        }
        None => Ok(Arc::new(InMemoryLedgerStore::with_lock_timeout(
            config.lock_timeout(),
        ))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => LedgerConfig::load(path).into_diagnostic()?,
        None => LedgerConfig::default(),
    };
    if let Some(ms) = cli.lock_timeout_ms {
        config.lock_timeout_ms = ms;
    }
    init_logging(&config.logging);

    let ledger = Ledger::new(open_store(cli.db_path, &config)?);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command in reader.commands() {
        let command = match command {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Error reading command");
                continue;
            }
        };

        match command {
            LedgerCommand::Open(params) => {
                if let Err(e) = ledger.open_account(params).await {
                    warn!(error = %e, "Error opening account");
                }
            }
            LedgerCommand::Transfer { params, currency } => {
                let ctx = match config.transfer_timeout() {
                    Some(timeout) => Context::background().with_timeout(timeout),
                    None => Context::background(),
                };
                match ledger.transfer(&ctx, params, currency.as_deref()).await {
                    Ok(result) => info!(
                        transfer_id = result.transfer.id,
                        from_balance = result.from_account.balance,
                        to_balance = result.to_account.balance,
                        "transfer applied"
                    ),
                    Err(e) => warn!(error = %e, "Error processing transfer"),
                }
            }
        }
    }

    let accounts = ledger.into_results().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(accounts).into_diagnostic()?;

    Ok(())
}
