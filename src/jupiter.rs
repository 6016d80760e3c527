use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, SwapError};
use crate::rate_limit::RateLimiter;

/// Aggregator error codes that mean "nothing to route", not "request broken".
const NO_ROUTE_ERROR_CODES: &[&str] = &["COULD_NOT_FIND_ANY_ROUTE", "NO_ROUTES_FOUND", "TOKEN_NOT_TRADABLE"];

/// Quote + swap-transaction source. Implemented by [`JupiterClient`]; tests swap in fakes.
#[async_trait]
pub trait SwapVenue: Send + Sync {
    async fn quote(&self, req: &QuoteRequest) -> Result<Quote>;

    /// Consumes the quote: a quote backs at most one transaction.
    async fn swap_transaction(
        &self,
        quote: Quote,
        user_public_key: &str,
        wrap_and_unwrap_sol: bool,
    ) -> Result<SwapTransactionPayload>;
}

#[derive(Clone)]
pub struct JupiterClient {
    base_url: String,
    http: Client,
    limiter: Arc<RateLimiter>,
}

impl JupiterClient {
    pub fn new(base_url: String, limiter: Arc<RateLimiter>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
            limiter,
        }
    }

    async fn read_error(resp: reqwest::Response) -> SwapError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        SwapError::http(status, body)
    }
}

#[async_trait]
impl SwapVenue for JupiterClient {
    async fn quote(&self, req: &QuoteRequest) -> Result<Quote> {
        let url = format!("{}/quote", self.base_url);
        debug!(?req, "jupiter.quote.request");

        self.limiter.acquire().await;
        let resp = self.http.get(url).query(req).send().await?;
        if !resp.status().is_success() {
            let err = Self::read_error(resp).await;
            return Err(reclassify_no_route(err, req));
        }
        let raw: Value = resp.json().await?;
        let quote = Quote::from_response(req, raw)?;
        info!(
            input_mint = %quote.input_mint,
            output_mint = %quote.output_mint,
            in_amount = quote.in_amount,
            out_amount = quote.out_amount,
            hops = quote.route_plan.len(),
            "jupiter.quote"
        );
        Ok(quote)
    }

    async fn swap_transaction(
        &self,
        quote: Quote,
        user_public_key: &str,
        wrap_and_unwrap_sol: bool,
    ) -> Result<SwapTransactionPayload> {
        // Unreachable through `Quote::from_response`; guards the raw body we forward.
        if quote.route_plan.is_empty() {
            return Err(SwapError::InvalidRequest("quote has an empty route plan".into()));
        }
        let url = format!("{}/swap", self.base_url);
        let input_mint = quote.input_mint.clone();
        let body = SwapRequest {
            quote_response: quote.raw,
            user_public_key: user_public_key.to_string(),
            wrap_and_unwrap_sol,
        };

        self.limiter.acquire().await;
        let resp = self.http.post(url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(Self::read_error(resp).await);
        }
        let swap: SwapResponse = resp.json().await?;
        let payload = SwapTransactionPayload::from_base64(&swap.swap_transaction, input_mint, user_public_key)?;
        info!(input_mint = %payload.input_mint, bytes = payload.byte_len(), "jupiter.swap");
        Ok(payload)
    }
}

/// The aggregator answers some unroutable pairs with a 4xx and an error code
/// instead of an empty `routePlan`. Both mean the same thing to callers.
fn reclassify_no_route(err: SwapError, req: &QuoteRequest) -> SwapError {
    let SwapError::RequestFailed { status: Some(status), body: Some(body), .. } = &err else {
        return err;
    };
    if !(400..500).contains(status) {
        return err;
    }
    let code = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("errorCode").and_then(Value::as_str).map(str::to_owned));
    match code {
        Some(code) if NO_ROUTE_ERROR_CODES.contains(&code.as_str()) => {
            warn!(%code, input_mint = %req.input_mint, "jupiter.quote.no_route");
            SwapError::NoRouteFound {
                input_mint: req.input_mint.clone(),
                output_mint: req.output_mint.clone(),
            }
        }
        _ => err,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub input_mint: String,
    pub output_mint: String,
    /// Amount in the input mint's smallest unit, as a decimal string.
    pub amount: String,
    pub slippage_bps: u16,
    pub restrict_intermediate_tokens: bool,
}

impl QuoteRequest {
    pub fn new(input_mint: &str, output_mint: &str, amount_raw: u64, slippage_bps: u16) -> Result<Self> {
        if input_mint == output_mint {
            return Err(SwapError::InvalidRequest("input and output mint are the same".into()));
        }
        if amount_raw == 0 {
            return Err(SwapError::InvalidRequest("amount must be positive".into()));
        }
        Ok(Self {
            input_mint: input_mint.to_string(),
            output_mint: output_mint.to_string(),
            amount: amount_raw.to_string(),
            slippage_bps,
            restrict_intermediate_tokens: true,
        })
    }

    pub fn restrict_intermediate_tokens(mut self, restrict: bool) -> Self {
        self.restrict_intermediate_tokens = restrict;
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    out_amount: String,
    #[serde(default)]
    route_plan: Vec<Value>,
}

/// A routed, priced proposal. Only obtainable from a response with at least one hop.
/// Not `Clone`: `/swap` consumes it.
#[derive(Debug)]
pub struct Quote {
    input_mint: String,
    output_mint: String,
    in_amount: u64,
    out_amount: u64,
    slippage_bps: u16,
    route_plan: Vec<Value>,
    /// Verbatim response body, posted back to `/swap`.
    raw: Value,
}

impl Quote {
    pub fn from_response(req: &QuoteRequest, raw: Value) -> Result<Self> {
        let parsed: QuoteResponse = serde_json::from_value(raw.clone())
            .map_err(|e| SwapError::Decode(format!("quote response: {e}")))?;
        if parsed.route_plan.is_empty() {
            return Err(SwapError::NoRouteFound {
                input_mint: req.input_mint.clone(),
                output_mint: req.output_mint.clone(),
            });
        }
        let out_amount = parsed
            .out_amount
            .parse::<u64>()
            .map_err(|e| SwapError::Decode(format!("outAmount {:?}: {e}", parsed.out_amount)))?;
        let in_amount = req
            .amount
            .parse::<u64>()
            .map_err(|e| SwapError::InvalidRequest(format!("amount {:?}: {e}", req.amount)))?;
        Ok(Self {
            input_mint: req.input_mint.clone(),
            output_mint: req.output_mint.clone(),
            in_amount,
            out_amount,
            slippage_bps: req.slippage_bps,
            route_plan: parsed.route_plan,
            raw,
        })
    }

    pub fn input_mint(&self) -> &str {
        &self.input_mint
    }

    pub fn output_mint(&self) -> &str {
        &self.output_mint
    }

    pub fn in_amount(&self) -> u64 {
        self.in_amount
    }

    pub fn out_amount(&self) -> u64 {
        self.out_amount
    }

    pub fn slippage_bps(&self) -> u16 {
        self.slippage_bps
    }

    pub fn route_plan(&self) -> &[Value] {
        &self.route_plan
    }

    /// True iff this quote was produced for exactly this tuple.
    pub fn matches(&self, input_mint: &str, output_mint: &str, in_amount: u64, slippage_bps: u16) -> bool {
        self.input_mint == input_mint
            && self.output_mint == output_mint
            && self.in_amount == in_amount
            && self.slippage_bps == slippage_bps
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapRequest {
    quote_response: Value,
    user_public_key: String,
    wrap_and_unwrap_sol: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    /// base64 encoded VersionedTransaction
    swap_transaction: String,
}

/// Unsigned transaction bytes for one quote and one requester. Not `Clone`:
/// submitting consumes it.
pub struct SwapTransactionPayload {
    bytes: Vec<u8>,
    input_mint: String,
    requester: String,
}

impl SwapTransactionPayload {
    pub fn from_base64(encoded: &str, input_mint: String, requester: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
        if bytes.is_empty() {
            return Err(SwapError::Decode("empty swap transaction".into()));
        }
        Ok(Self::from_bytes(bytes, input_mint, requester))
    }

    pub fn from_bytes(bytes: Vec<u8>, input_mint: String, requester: &str) -> Self {
        Self { bytes, input_mint, requester: requester.to_string() }
    }

    pub fn input_mint(&self) -> &str {
        &self.input_mint
    }

    pub fn requester(&self) -> &str {
        &self.requester
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Debug for SwapTransactionPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwapTransactionPayload")
            .field("input_mint", &self.input_mint)
            .field("requester", &self.requester)
            .field("len", &self.bytes.len())
            .finish()
    }
}
