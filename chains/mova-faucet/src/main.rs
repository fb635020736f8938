use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use core_logic::{setup_logger, MetricsCollector, WorkerRunner, OUTCOME_TARGET};
use dialoguer::{theme::ColorfulTheme, Input, Select};
use dotenv::dotenv;
use mova_faucet::{Amount, FaucetClient, MovaConfig, Orchestrator, RunMode, TransferEngine};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chains/mova-faucet/config.toml")]
    config: String,
    /// Write a JSON metrics snapshot here when the run ends
    #[arg(short, long)]
    export_metrics: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create and fund COUNT new wallets
    Claim {
        count: u64,
        /// Keep wallets already in the key store instead of starting empty
        #[arg(long)]
        append: bool,
    },
    /// Create and fund wallets until Ctrl+C
    ClaimForever {
        #[arg(long)]
        append: bool,
    },
    /// Request funds again for every stored wallet
    Reclaim,
    /// Send AMOUNT (or "all") from every stored wallet to RECIPIENT
    Distribute { recipient: String, amount: String },
}

fn prompt_mode() -> Result<(RunMode, bool)> {
    let theme = ColorfulTheme::default();
    let choices = [
        "Claim faucet with new wallets",
        "Claim faucet forever",
        "Re-claim for saved wallets",
        "Send funds from saved wallets",
    ];
    let selection = Select::with_theme(&theme)
        .with_prompt("Select mode")
        .default(0)
        .items(&choices)
        .interact()?;

    let mode = match selection {
        0 => {
            let count: u64 = Input::with_theme(&theme)
                .with_prompt("How many wallets")
                .default(10)
                .interact_text()?;
            RunMode::ClaimOnce { count }
        }
        1 => RunMode::ClaimForever,
        2 => RunMode::Reclaim,
        _ => {
            let recipient: String = Input::with_theme(&theme)
                .with_prompt("Recipient address")
                .interact_text()?;
            let amount: String = Input::with_theme(&theme)
                .with_prompt("Amount per wallet (or \"all\")")
                .default("all".to_string())
                .interact_text()?;
            RunMode::Distribute {
                recipient,
                amount: amount.parse()?,
            }
        }
    };
    Ok((mode, false))
}

fn mode_from_command(command: Command) -> Result<(RunMode, bool)> {
    Ok(match command {
        Command::Claim { count, append } => (RunMode::ClaimOnce { count }, append),
        Command::ClaimForever { append } => (RunMode::ClaimForever, append),
        Command::Reclaim => (RunMode::Reclaim, false),
        Command::Distribute { recipient, amount } => {
            let amount: Amount = amount.parse()?;
            (RunMode::Distribute { recipient, amount }, false)
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let config = MovaConfig::load(&args.config)?;
    let _log_guard = setup_logger(&config.log_dir);
    info!(
        target: OUTCOME_TARGET,
        "Loaded config from {} (chain {})",
        args.config,
        config.chain_id
    );

    let (mode, append) = match args.command {
        Some(command) => mode_from_command(command)?,
        None => prompt_mode().context("Interactive menu needs a terminal; pass a subcommand")?,
    };

    let reads_existing = matches!(mode, RunMode::Reclaim | RunMode::Distribute { .. });
    let mut keys = config.key_store(append || reads_existing).await?;
    if reads_existing && keys.is_empty() {
        bail!("No funded wallets found in {}", keys.location());
    }

    let proxies = Arc::new(config.proxy_pool().await);
    let faucet = FaucetClient::new(&config)?;
    let transfer = TransferEngine::new(&config)?;
    let orchestrator = Orchestrator::new(config, faucet, transfer, proxies);

    let token = WorkerRunner::shutdown_token();
    let result = orchestrator.run(&mode, &mut keys, &token).await;

    if let Some(path) = &args.export_metrics {
        match MetricsCollector::global().export_to_file(path).await {
            Ok(()) => info!(target: OUTCOME_TARGET, "Metrics written to {}", path),
            Err(e) => error!("Failed to write metrics to {}: {}", path, e),
        }
    }

    let stats = result?;
    info!(
        target: OUTCOME_TARGET,
        "Done: {} succeeded, {} failed, {} skipped ({} wallets in {})",
        stats.success,
        stats.failed,
        stats.skipped,
        keys.len(),
        keys.location()
    );
    Ok(())
}
