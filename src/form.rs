use std::str::FromStr;

use rust_decimal::Decimal;

use crate::domain::{to_raw_amount, AssetHolding, SwapTarget, NATIVE_MINT};
use crate::error::{Result, SwapError};
use crate::jupiter::{Quote, QuoteRequest};

pub const DEFAULT_SLIPPAGE_BPS: u16 = 50;

/// Single-swap input state plus the quote it last produced.
///
/// Any setter that touches a field the quote depends on drops the held
/// quote, so the next action re-quotes instead of executing a stale route.
#[derive(Debug)]
pub struct SwapForm {
    from: Option<SwapTarget>,
    amount: String,
    output_mint: String,
    slippage_bps: u16,
    quote: Option<Quote>,
}

impl Default for SwapForm {
    fn default() -> Self {
        Self {
            from: None,
            amount: String::new(),
            output_mint: NATIVE_MINT.to_string(),
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            quote: None,
        }
    }
}

impl SwapForm {
    pub fn output_mint(&self) -> &str {
        &self.output_mint
    }

    pub fn slippage_bps(&self) -> u16 {
        self.slippage_bps
    }

    pub fn set_from(&mut self, target: SwapTarget) {
        self.from = Some(target);
        self.quote = None;
    }

    pub fn set_amount(&mut self, amount: impl Into<String>) {
        self.amount = amount.into();
        self.quote = None;
    }

    pub fn set_output_mint(&mut self, mint: impl Into<String>) {
        self.output_mint = mint.into();
        self.quote = None;
    }

    pub fn set_slippage_bps(&mut self, bps: u16) {
        self.slippage_bps = bps;
        self.quote = None;
    }

    /// Percent in, bps stored. Negative or NaN resets to the default and
    /// reports the rejection.
    pub fn set_slippage_pct(&mut self, pct: f64) -> Result<()> {
        self.quote = None;
        if pct.is_nan() || pct < 0.0 {
            self.slippage_bps = DEFAULT_SLIPPAGE_BPS;
            return Err(SwapError::InvalidRequest(format!(
                "slippage cannot be negative; reset to {}%",
                DEFAULT_SLIPPAGE_BPS as f64 / 100.0
            )));
        }
        let bps = (pct * 100.0).round();
        if bps > u16::MAX as f64 {
            return Err(SwapError::InvalidRequest(format!("slippage {pct}% out of range")));
        }
        self.slippage_bps = bps as u16;
        Ok(())
    }

    /// Selection checks shared by both paths.
    pub fn validate(&self) -> Result<&SwapTarget> {
        let from = self
            .from
            .as_ref()
            .ok_or_else(|| SwapError::InvalidRequest("select a 'From' token or ALL".into()))?;
        if self.output_mint.is_empty() {
            return Err(SwapError::InvalidRequest("select a 'To' token".into()));
        }
        if let SwapTarget::Single(mint) = from {
            if *mint == self.output_mint {
                return Err(SwapError::InvalidRequest("'From' and 'To' tokens cannot be the same".into()));
            }
        }
        Ok(from)
    }

    /// Quote request for the single path, sized with the held asset's decimals.
    pub fn quote_request(&self, holdings: &[AssetHolding]) -> Result<QuoteRequest> {
        let SwapTarget::Single(mint) = self.validate()? else {
            return Err(SwapError::InvalidRequest("ALL uses the batch path".into()));
        };
        let holding = holdings
            .iter()
            .find(|h| h.mint_address == *mint)
            .ok_or_else(|| SwapError::InvalidRequest(format!("{mint} is not held by this wallet")))?;
        let amount = Decimal::from_str(self.amount.trim())
            .map_err(|e| SwapError::InvalidRequest(format!("amount {:?}: {e}", self.amount)))?;
        let raw = to_raw_amount(amount, holding.decimals)?;
        QuoteRequest::new(mint, &self.output_mint, raw, self.slippage_bps)
    }

    pub fn hold_quote(&mut self, quote: Quote) {
        self.quote = Some(quote);
    }

    /// The held quote, only if it still matches the current inputs.
    pub fn held_quote(&self, holdings: &[AssetHolding]) -> Option<&Quote> {
        let quote = self.quote.as_ref()?;
        let req = self.quote_request(holdings).ok()?;
        let raw = req.amount.parse().ok()?;
        quote
            .matches(&req.input_mint, &req.output_mint, raw, req.slippage_bps)
            .then_some(quote)
    }

    /// Hands the quote to the executor; the form no longer holds one.
    pub fn take_quote(&mut self, holdings: &[AssetHolding]) -> Option<Quote> {
        self.held_quote(holdings)?;
        self.quote.take()
    }
}
