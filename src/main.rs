use std::sync::Arc;

use anyhow::{anyhow, Result};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use flush_swap::config::Config;
use flush_swap::domain::{AssetHolding, BatchSummary, SwapOutcome, SwapTarget};
use flush_swap::engine::{Engine, EngineOptions};
use flush_swap::form::SwapForm;
use flush_swap::jupiter::JupiterClient;
use flush_swap::ledger::Ledger;
use flush_swap::notifier::{batch_message, Notifier};
use flush_swap::rate_limit::RateLimiter;
use flush_swap::submitter::{KeypairSigner, RpcSubmitter, Submitter, TransactionSigner};
use flush_swap::{journal, monitoring, SwapVenue};

#[tokio::main]
async fn main() -> Result<()> {
    // Load local .env if present (no-op in prod/systemd envs)
    let _ = dotenvy::dotenv();

    monitoring::init_tracing();

    let cfg = Config::from_env()?;
    info!(?cfg, "boot");
    let target = cfg.swap_target()?;

    let limiter = Arc::new(RateLimiter::new(cfg.request_interval()));
    let rpc = Arc::new(RpcClient::new_with_commitment(
        cfg.rpc_http_url.clone(),
        CommitmentConfig::confirmed(),
    ));
    let keypair_path = cfg
        .sol_keypair_path
        .as_deref()
        .ok_or_else(|| anyhow!("SOL_KEYPAIR_PATH is required"))?;
    let signer = Arc::new(KeypairSigner::from_file(keypair_path)?);
    let owner = signer.pubkey();

    let ledger = Ledger::new(rpc.clone(), limiter.clone());
    let venue = JupiterClient::new(cfg.jupiter_base_url.clone(), limiter.clone());
    let submitter = RpcSubmitter::new(rpc, limiter, signer, cfg.confirm_policy(), cfg.dry_run);
    let engine = Engine::new(
        venue,
        submitter,
        owner.to_string(),
        EngineOptions {
            restrict_intermediate_tokens: cfg.restrict_intermediate_tokens,
            wrap_and_unwrap_sol: cfg.wrap_and_unwrap_sol,
        },
    );

    let holdings = ledger.holdings(&owner).await?;
    for h in &holdings {
        info!(mint = %h.mint_address, symbol = h.display_symbol(), amount = %h.amount, "wallet.holding");
    }

    let outcomes = match &target {
        SwapTarget::AllHoldings => {
            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("ctrl-c: stopping after the current token");
                    on_ctrl_c.cancel();
                }
            });
            engine
                .swap_all(&holdings, &cfg.output_mint, cfg.slippage_bps, &cancel)
                .await
        }
        SwapTarget::Single(_) => vec![run_single(&cfg, &target, &engine, &ledger, &holdings).await?],
    };

    let summary = BatchSummary::from_outcomes(&outcomes);
    info!(%target, output_mint = %cfg.output_mint, %summary, "run.done");

    if let Some(path) = cfg.report_path.as_deref() {
        if let Err(err) = journal::append_batch_report(path, &outcomes) {
            error!(%err, path, "journal.write_failed");
        }
    }
    let notifier = Notifier::new(cfg.slack_webhook_url.clone());
    if let Err(err) = notifier.alert(&batch_message(&cfg.output_mint, &summary)).await {
        warn!(%err, "notifier.alert_failed");
    }

    Ok(())
}

/// Quote, show the estimate, then execute the held quote. Errors abort.
async fn run_single<V: SwapVenue, S: Submitter>(
    cfg: &Config,
    target: &SwapTarget,
    engine: &Engine<V, S>,
    ledger: &Ledger,
    holdings: &[AssetHolding],
) -> Result<SwapOutcome> {
    let mut form = SwapForm::default();
    form.set_from(target.clone());
    form.set_amount(
        cfg.swap_amount
            .clone()
            .ok_or_else(|| anyhow!("SWAP_AMOUNT is required for a single swap"))?,
    );
    form.set_output_mint(cfg.output_mint.clone());
    form.set_slippage_bps(cfg.slippage_bps);

    let req = form.quote_request(holdings)?;
    let output_decimals = ledger.mint_decimals(form.output_mint()).await?;
    let preview = engine.quote_single(req, output_decimals).await?;
    info!(estimated_output = %preview.estimated_output, output_mint = %form.output_mint(), "single.estimate");
    form.hold_quote(preview.quote);

    let quote = form
        .take_quote(holdings)
        .ok_or_else(|| anyhow!("quote no longer matches the form; re-quote"))?;
    let input_mint = quote.input_mint().to_string();
    let signature = engine.execute_single(quote).await?;
    info!(%signature, "single.swapped");

    let holding = holdings
        .iter()
        .find(|h| h.mint_address == input_mint)
        .ok_or_else(|| anyhow!("{input_mint} missing from holdings"))?;
    Ok(SwapOutcome::success(holding, signature.to_string()))
}
