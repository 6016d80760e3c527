use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{SwapTarget, NATIVE_MINT};
use crate::rate_limit::REQUEST_INTERVAL_MS;
use crate::submitter::ConfirmPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // RPC
    pub rpc_http_url: String,

    // Aggregator
    pub jupiter_base_url: String,
    pub request_interval_ms: u64,
    pub restrict_intermediate_tokens: bool,
    pub wrap_and_unwrap_sol: bool,

    // Swap
    pub slippage_bps: u16,
    pub max_slippage_bps: u16,
    /// `ALL` or a mint address.
    pub swap_from: Option<String>,
    pub swap_amount: Option<String>,
    pub output_mint: String,

    // Confirmation
    pub confirm_timeout_secs: u64,
    pub confirm_poll_ms: u64,

    // Runtime
    pub dry_run: bool,
    pub sol_keypair_path: Option<String>,

    // Reporting
    pub slack_webhook_url: Option<String>,
    pub report_path: Option<String>,
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|s| s.trim().to_lowercase()) {
        None => default,
        Some(v) if v.is_empty() => default,
        Some(v) if v == "1" || v == "true" || v == "yes" || v == "y" || v == "on" => true,
        Some(v) if v == "0" || v == "false" || v == "no" || v == "n" || v == "off" => false,
        Some(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|x| x.trim().parse().ok())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let rpc_http_url =
            env_opt("SOLANA_RPC_HTTP").unwrap_or_else(|| "https://api.mainnet-beta.solana.com".to_string());

        let jupiter_base_url =
            env_opt("JUPITER_BASE_URL").unwrap_or_else(|| "https://quote-api.jup.ag/v6".to_string());
        let request_interval_ms = env_parse::<u64>("SWAP_REQUEST_INTERVAL_MS").unwrap_or(REQUEST_INTERVAL_MS);
        let restrict_intermediate_tokens = env_bool("SWAP_RESTRICT_INTERMEDIATE_TOKENS", true);
        let wrap_and_unwrap_sol = env_bool("SWAP_WRAP_AND_UNWRAP_SOL", true);

        let slippage_bps = env_parse::<u16>("SWAP_SLIPPAGE_BPS").unwrap_or(50);
        let max_slippage_bps = env_parse::<u16>("SWAP_MAX_SLIPPAGE_BPS").unwrap_or(1000);
        ensure_slippage_bounds(slippage_bps, max_slippage_bps)?;

        let swap_from = env_opt("SWAP_FROM");
        let swap_amount = env_opt("SWAP_AMOUNT");
        let output_mint = env_opt("SWAP_OUTPUT_MINT").unwrap_or_else(|| NATIVE_MINT.to_string());

        let confirm_timeout_secs = env_parse::<u64>("SWAP_CONFIRM_TIMEOUT_SECS").unwrap_or(60);
        let confirm_poll_ms = env_parse::<u64>("SWAP_CONFIRM_POLL_MS").unwrap_or(2000);
        if confirm_timeout_secs == 0 {
            return Err(anyhow!("SWAP_CONFIRM_TIMEOUT_SECS must be positive"));
        }

        let dry_run = env_bool("DRY_RUN", false);
        let sol_keypair_path = env_opt("SOL_KEYPAIR_PATH");

        let slack_webhook_url = env_opt("SLACK_WEBHOOK_URL");
        let report_path = env_opt("SWAP_REPORT_PATH");

        Ok(Self {
            rpc_http_url,
            jupiter_base_url,
            request_interval_ms,
            restrict_intermediate_tokens,
            wrap_and_unwrap_sol,
            slippage_bps,
            max_slippage_bps,
            swap_from,
            swap_amount,
            output_mint,
            confirm_timeout_secs,
            confirm_poll_ms,
            dry_run,
            sol_keypair_path,
            slack_webhook_url,
            report_path,
        })
    }

    pub fn swap_target(&self) -> Result<SwapTarget> {
        let raw = self
            .swap_from
            .as_deref()
            .ok_or_else(|| anyhow!("SWAP_FROM is required (a mint address or ALL)"))?;
        Ok(raw.parse::<SwapTarget>()?)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn confirm_policy(&self) -> ConfirmPolicy {
        ConfirmPolicy {
            timeout: Duration::from_secs(self.confirm_timeout_secs),
            poll_interval: Duration::from_millis(self.confirm_poll_ms),
        }
    }
}

pub fn ensure_slippage_bounds(slippage_bps: u16, max_slippage_bps: u16) -> Result<()> {
    if slippage_bps > max_slippage_bps {
        return Err(anyhow!(
            "slippage_bps ({slippage_bps}) exceeds max_slippage_bps ({max_slippage_bps})"
        ));
    }
    Ok(())
}
