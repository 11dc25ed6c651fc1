//! Command Line Interface for the wallet synchronization engine.
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use prettytable::{Table, row};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use walletsync_domain::entities::{Account, TokenCatalog, TokenCurrency};
use walletsync_domain::value_objects::Amount;
use walletsync_execution::prelude::*;
use walletsync_families::prelude::*;
use walletsync_reconcile::prelude::compute_sync_hash;

#[derive(Parser)]
#[command(name = "walletsync")]
#[command(about = "Multi-chain wallet account synchronization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported currencies and the families with a bridge
    Families,
    /// Compute the sync hash of a currency's token list
    SyncHash {
        /// JSON file holding a list of tokens
        #[arg(short, long)]
        tokens: PathBuf,

        /// Parent currency id (e.g., ethereum)
        #[arg(short, long, default_value = "ethereum")]
        currency: String,
    },
    /// Synchronize the accounts of a backend fixture
    Sync {
        /// JSON fixture with tokens, fee data and account states
        #[arg(short, long)]
        fixture: PathBuf,

        /// Number of sync rounds to run
        #[arg(short, long, default_value_t = 1)]
        rounds: u32,
    },
}

/// Backend state served to the bridges by the `sync` command.
#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    tokens: Vec<TokenCurrency>,
    #[serde(default)]
    fee_data: Vec<FixtureFees>,
    accounts: Vec<FixtureAccount>,
}

#[derive(Debug, Deserialize)]
struct FixtureFees {
    currency_id: String,
    #[serde(flatten)]
    data: RawFeeData,
}

#[derive(Debug, Deserialize)]
struct FixtureAccount {
    currency_id: String,
    address: String,
    state: RawAccountState,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn display_amount(amount: Amount, magnitude: u32) -> String {
    amount
        .to_decimal(magnitude)
        .map_or_else(|| amount.to_string(), |value| value.to_string())
}

fn print_families(registry: &BridgeRegistry) {
    let mut table = Table::new();
    table.set_titles(row!["Currency", "Name", "Ticker", "Family", "Bridge"]);
    for currency in supported_currencies() {
        let bridge = if registry.supports(currency.family) {
            "yes"
        } else {
            "no"
        };
        table.add_row(row![
            currency.id,
            currency.name,
            currency.ticker,
            currency.family,
            bridge
        ]);
    }
    table.printstd();
}

fn print_account(account: &Account) {
    let magnitude = find_chain(&account.currency_id)
        .map(|chain| chain.currency.magnitude)
        .unwrap_or(0);

    println!("\n{} (block {})", account.id, account.block_height);
    let mut table = Table::new();
    table.set_titles(row!["Account", "Balance", "Operations", "Pending"]);
    table.add_row(row![
        account.address,
        display_amount(account.balance, magnitude),
        account.operations_count,
        account.pending_operations.len()
    ]);
    for sub in &account.sub_accounts {
        table.add_row(row![
            format!("  {}", sub.token_id),
            sub.balance,
            sub.operations_count,
            sub.pending_operations.len()
        ]);
    }
    table.printstd();

    let mut operations = Table::new();
    operations.set_titles(row!["Hash", "Type", "Value", "Block", "Children"]);
    for op in account.operations.iter() {
        operations.add_row(row![
            op.hash,
            op.op_type,
            display_amount(op.value, magnitude),
            op.block_height.map_or_else(|| "-".to_string(), |h| h.to_string()),
            op.sub_operations.len() + op.nft_operations.len()
        ]);
    }
    operations.printstd();
}

async fn run_sync(fixture_path: &Path, rounds: u32) -> Result<()> {
    let fixture: Fixture = read_json(fixture_path)?;
    let config = SyncConfig::from_env()?;

    let source = Arc::new(InMemorySource::new());
    for fees in fixture.fee_data {
        source.set_fee_data(&fees.currency_id, fees.data).await;
    }

    let registry = BridgeRegistry::standard(source.clone(), config.cache.clone());
    let synchronizer = Synchronizer::new(
        registry,
        TokenCatalog::from_tokens(fixture.tokens),
        config,
    );

    for account in fixture.accounts {
        let Some(chain) = find_chain(&account.currency_id) else {
            bail!("unknown currency in fixture: {}", account.currency_id);
        };
        source
            .set_account(&account.currency_id, &account.address, account.state)
            .await;
        synchronizer
            .track(AccountKey::new(
                chain.currency.family,
                &account.currency_id,
                &account.address,
            ))
            .await;
    }

    for round in 1..=rounds.max(1) {
        let report = synchronizer.sync_all().await;
        info!(
            round,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Sync round complete"
        );

        println!("\n🔄 Round {round}");
        let mut table = Table::new();
        table.set_titles(row!["Account", "Result", "Full sync", "Operations"]);
        for pass in &report.succeeded {
            table.add_row(row![
                pass.account_id,
                format!("{:?}", pass.outcome),
                pass.full_sync,
                pass.operations_count
            ]);
        }
        for (account_id, err) in &report.failed {
            table.add_row(row![account_id, format!("❌ {err}"), "-", "-"]);
        }
        table.printstd();
    }

    for account_id in synchronizer.store().account_ids().await {
        if let Some(account) = synchronizer.store().account(&account_id).await {
            print_account(&account);
        }
    }
    println!("\n📡 Backend fetches: {}", source.fetch_count());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Families => {
            let config = SyncConfig::from_env()?;
            let registry =
                BridgeRegistry::standard(Arc::new(InMemorySource::new()), config.cache);
            print_families(&registry);
            println!(
                "\nBridges: {}",
                registry
                    .families()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Commands::SyncHash { tokens, currency } => {
            let tokens: Vec<TokenCurrency> = read_json(tokens)?;
            let catalog = TokenCatalog::from_tokens(tokens);
            let listed = catalog.tokens_for(currency);
            println!("🔑 {} tokens for {}", listed.len(), currency);
            println!("{}", compute_sync_hash(listed));
        }
        Commands::Sync { fixture, rounds } => {
            run_sync(fixture, *rounds).await?;
        }
    }

    Ok(())
}
