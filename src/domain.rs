use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};

/// Wrapped SOL mint. The native balance is reported under this mint.
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";
pub const NATIVE_DECIMALS: u8 = 9;
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const USDT_MINT: &str = "Es9vMFrzaCER5Z9EuFbc6tZzzLLndgUkGL9NWtwWkPdb";

/// Largest scale for which 10^decimals still fits in a u64.
const MAX_DECIMALS: u8 = 19;

/// One row of the wallet snapshot. Replaced wholesale on each refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetHolding {
    pub mint_address: String,
    /// Human units.
    pub amount: Decimal,
    pub decimals: u8,
    pub symbol: Option<String>,
}

impl AssetHolding {
    pub fn display_symbol(&self) -> &str {
        self.symbol.as_deref().unwrap_or("UNKNOWN")
    }

    pub fn raw_amount(&self) -> Result<u64> {
        to_raw_amount(self.amount, self.decimals)
    }
}

/// floor(amount * 10^decimals). Truncates, never rounds.
pub fn to_raw_amount(amount: Decimal, decimals: u8) -> Result<u64> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(SwapError::InvalidRequest(format!("negative amount {amount}")));
    }
    if decimals > MAX_DECIMALS {
        return Err(SwapError::InvalidRequest(format!("unsupported decimals {decimals}")));
    }
    let scale = Decimal::from(10u64.pow(decimals as u32));
    let raw = amount
        .checked_mul(scale)
        .map(|v| v.floor())
        .and_then(|v| v.to_u64())
        .ok_or_else(|| SwapError::InvalidRequest(format!("amount {amount} overflows at {decimals} decimals")))?;
    if raw == 0 {
        return Err(SwapError::InvalidRequest(format!(
            "amount {amount} is below the smallest unit at {decimals} decimals"
        )));
    }
    Ok(raw)
}

/// Inverse of [`to_raw_amount`] for display.
pub fn from_raw_amount(raw: u64, decimals: u8) -> Result<Decimal> {
    if decimals > MAX_DECIMALS {
        return Err(SwapError::InvalidRequest(format!("unsupported decimals {decimals}")));
    }
    Ok(Decimal::from_i128_with_scale(raw as i128, decimals as u32).normalize())
}

/// What the "From" selector points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapTarget {
    Single(String),
    AllHoldings,
}

impl FromStr for SwapTarget {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Err(SwapError::InvalidRequest("empty swap target".into())),
            t if t.eq_ignore_ascii_case("ALL") => Ok(SwapTarget::AllHoldings),
            mint => Ok(SwapTarget::Single(mint.to_string())),
        }
    }
}

impl fmt::Display for SwapTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapTarget::Single(mint) => f.write_str(mint),
            SwapTarget::AllHoldings => f.write_str("ALL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Success,
    NoRoute,
    Failed,
    /// Batch was cancelled before this item was attempted.
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapOutcome {
    pub mint_address: String,
    pub symbol: Option<String>,
    pub status: OutcomeStatus,
    pub signature: Option<String>,
    pub error_detail: Option<String>,
}

impl SwapOutcome {
    pub fn success(holding: &AssetHolding, signature: String) -> Self {
        Self::new(holding, OutcomeStatus::Success, Some(signature), None)
    }

    pub fn no_route(holding: &AssetHolding, detail: String) -> Self {
        Self::new(holding, OutcomeStatus::NoRoute, None, Some(detail))
    }

    pub fn failed(holding: &AssetHolding, err: &SwapError) -> Self {
        Self::new(holding, OutcomeStatus::Failed, None, Some(err.to_string()))
    }

    pub fn cancelled(holding: &AssetHolding) -> Self {
        Self::new(holding, OutcomeStatus::Cancelled, None, None)
    }

    fn new(
        holding: &AssetHolding,
        status: OutcomeStatus,
        signature: Option<String>,
        error_detail: Option<String>,
    ) -> Self {
        Self {
            mint_address: holding.mint_address.clone(),
            symbol: holding.symbol.clone(),
            status,
            signature,
            error_detail,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub no_route: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[SwapOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut acc, o| {
            match o.status {
                OutcomeStatus::Success => acc.succeeded += 1,
                OutcomeStatus::NoRoute => acc.no_route += 1,
                OutcomeStatus::Failed => acc.failed += 1,
                OutcomeStatus::Cancelled => acc.cancelled += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.no_route + self.failed + self.cancelled
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} swapped, {} without route, {} failed, {} cancelled",
            self.succeeded, self.no_route, self.failed, self.cancelled
        )
    }
}
