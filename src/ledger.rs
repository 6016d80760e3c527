use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};

use crate::domain::{from_raw_amount, AssetHolding, NATIVE_DECIMALS, NATIVE_MINT};
use crate::error::{Result, SwapError};
use crate::rate_limit::RateLimiter;

/// SPL token program; wallet holdings are the accounts it owns for us.
const TOKEN_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// Read-only wallet view over the RPC node. Every call is rate limited.
#[derive(Clone)]
pub struct Ledger {
    rpc: Arc<RpcClient>,
    limiter: Arc<RateLimiter>,
}

impl Ledger {
    pub fn new(rpc: Arc<RpcClient>, limiter: Arc<RateLimiter>) -> Self {
        Self { rpc, limiter }
    }

    /// Fresh snapshot: native SOL first, then every parsed SPL token account.
    pub async fn holdings(&self, owner: &Pubkey) -> Result<Vec<AssetHolding>> {
        self.limiter.acquire().await;
        let accounts = self
            .rpc
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(TOKEN_PROGRAM_ID))
            .await?;

        let mut holdings = Vec::with_capacity(accounts.len() + 1);
        for keyed in &accounts {
            let account = serde_json::to_value(&keyed.account)
                .map_err(|e| SwapError::Decode(format!("token account {}: {e}", keyed.pubkey)))?;
            match holding_from_parsed_account(&account) {
                Some(h) => holdings.push(h),
                None => warn!(account = %keyed.pubkey, "ledger.token_account.unparsed"),
            }
        }

        self.limiter.acquire().await;
        let lamports = self.rpc.get_balance(owner).await?;
        holdings.insert(0, native_holding(lamports)?);

        info!(owner = %owner, count = holdings.len(), "ledger.holdings");
        Ok(holdings)
    }

    /// Decimals for `mint`, from the chain rather than a guess.
    pub async fn mint_decimals(&self, mint: &str) -> Result<u8> {
        if mint == NATIVE_MINT {
            return Ok(NATIVE_DECIMALS);
        }
        let pubkey = Pubkey::from_str(mint)
            .map_err(|e| SwapError::InvalidRequest(format!("mint {mint}: {e}")))?;
        self.limiter.acquire().await;
        let supply = self.rpc.get_token_supply(&pubkey).await?;
        Ok(supply.decimals)
    }
}

pub fn native_holding(lamports: u64) -> Result<AssetHolding> {
    Ok(AssetHolding {
        mint_address: NATIVE_MINT.to_string(),
        amount: from_raw_amount(lamports, NATIVE_DECIMALS)?,
        decimals: NATIVE_DECIMALS,
        symbol: Some("SOL".to_string()),
    })
}

/// Maps a jsonParsed token account (`data.parsed.info`) to a holding.
///
/// Prefers the exact raw `amount` over the float `uiAmount`.
pub fn holding_from_parsed_account(account: &Value) -> Option<AssetHolding> {
    let info = account.pointer("/data/parsed/info")?;
    let mint = info.get("mint")?.as_str()?;
    let token_amount = info.get("tokenAmount")?;
    let decimals = u8::try_from(token_amount.get("decimals")?.as_u64()?).ok()?;

    let amount = match token_amount.get("amount").and_then(Value::as_str) {
        Some(raw) => from_raw_amount(raw.parse().ok()?, decimals).ok()?,
        None => Decimal::from_str(token_amount.get("uiAmountString")?.as_str()?).ok()?,
    };

    Some(AssetHolding {
        mint_address: mint.to_string(),
        amount,
        decimals,
        symbol: None,
    })
}
