use rust_decimal::Decimal;
use solana_sdk::signature::Signature;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{from_raw_amount, AssetHolding, SwapOutcome};
use crate::error::Result;
use crate::jupiter::{Quote, QuoteRequest, SwapVenue};
use crate::submitter::Submitter;

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub restrict_intermediate_tokens: bool,
    pub wrap_and_unwrap_sol: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { restrict_intermediate_tokens: true, wrap_and_unwrap_sol: true }
    }
}

pub struct Engine<V, S> {
    venue: V,
    submitter: S,
    user_public_key: String,
    opts: EngineOptions,
}

/// A quote plus its expected output in human units.
#[derive(Debug)]
pub struct QuotePreview {
    pub quote: Quote,
    pub estimated_output: Decimal,
}

impl<V: SwapVenue, S: Submitter> Engine<V, S> {
    pub fn new(venue: V, submitter: S, user_public_key: String, opts: EngineOptions) -> Self {
        Self { venue, submitter, user_public_key, opts }
    }

    /// Single path, step one. `output_decimals` must come from the chain.
    pub async fn quote_single(&self, req: QuoteRequest, output_decimals: u8) -> Result<QuotePreview> {
        let req = req.restrict_intermediate_tokens(self.opts.restrict_intermediate_tokens);
        let quote = self.venue.quote(&req).await?;
        let estimated_output = from_raw_amount(quote.out_amount(), output_decimals)?;
        info!(
            input_mint = %quote.input_mint(),
            output_mint = %quote.output_mint(),
            %estimated_output,
            "engine.quote_single"
        );
        Ok(QuotePreview { quote, estimated_output })
    }

    /// Single path, step two. The first error aborts and is returned as is.
    pub async fn execute_single(&self, quote: Quote) -> Result<Signature> {
        info!(input_mint = %quote.input_mint(), in_amount = quote.in_amount(), "engine.execute_single");
        self.execute(quote).await
    }

    /// Swaps every eligible holding into `output_mint`, one at a time.
    ///
    /// Holdings already in `output_mint` or with a non-positive amount are
    /// dropped before any request. Each remaining holding gets exactly one
    /// outcome; an error on one never stops the rest. Cancellation is checked
    /// between items and marks the unattempted ones `Cancelled`.
    pub async fn swap_all(
        &self,
        holdings: &[AssetHolding],
        output_mint: &str,
        slippage_bps: u16,
        cancel: &CancellationToken,
    ) -> Vec<SwapOutcome> {
        let eligible: Vec<&AssetHolding> = holdings
            .iter()
            .filter(|h| h.mint_address != output_mint && h.amount > Decimal::ZERO)
            .collect();
        info!(total = holdings.len(), eligible = eligible.len(), %output_mint, "batch.start");

        let mut outcomes = Vec::with_capacity(eligible.len());
        for holding in eligible {
            if cancel.is_cancelled() {
                outcomes.push(SwapOutcome::cancelled(holding));
                continue;
            }
            let symbol = holding.display_symbol();
            let outcome = match self.swap_one(holding, output_mint, slippage_bps).await {
                Ok(signature) => {
                    info!(mint = %holding.mint_address, %symbol, %signature, "batch.item.swapped");
                    SwapOutcome::success(holding, signature.to_string())
                }
                Err(err) if err.is_no_route() => {
                    warn!(mint = %holding.mint_address, %symbol, "batch.item.no_route");
                    SwapOutcome::no_route(holding, err.to_string())
                }
                Err(err) => {
                    warn!(mint = %holding.mint_address, %symbol, error = %err, "batch.item.failed");
                    SwapOutcome::failed(holding, &err)
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn swap_one(&self, holding: &AssetHolding, output_mint: &str, slippage_bps: u16) -> Result<Signature> {
        let raw = holding.raw_amount()?;
        let req = QuoteRequest::new(&holding.mint_address, output_mint, raw, slippage_bps)?
            .restrict_intermediate_tokens(self.opts.restrict_intermediate_tokens);
        let quote = self.venue.quote(&req).await?;
        self.execute(quote).await
    }

    async fn execute(&self, quote: Quote) -> Result<Signature> {
        let payload = self
            .venue
            .swap_transaction(quote, &self.user_public_key, self.opts.wrap_and_unwrap_sol)
            .await?;
        let signature = self.submitter.submit(payload).await?;
        self.submitter.confirm(&signature).await?;
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OutcomeStatus, NATIVE_MINT, USDC_MINT};
    use crate::error::SwapError;
    use crate::jupiter::SwapTransactionPayload;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::str::FromStr;
    use std::sync::Mutex;

    const WALLET: &str = "Wallet1111111111111111111111111111111111111";

    #[derive(Default)]
    struct FakeVenue {
        no_route: HashSet<String>,
        quote_calls: Mutex<Vec<QuoteRequest>>,
        swap_calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SwapVenue for FakeVenue {
        async fn quote(&self, req: &QuoteRequest) -> Result<Quote> {
            self.quote_calls.lock().unwrap().push(req.clone());
            let route = if self.no_route.contains(&req.input_mint) { json!([]) } else { json!([{}]) };
            let out: u64 = req.amount.parse::<u64>().unwrap() * 2;
            Quote::from_response(req, json!({ "outAmount": out.to_string(), "routePlan": route }))
        }

        async fn swap_transaction(&self, quote: Quote, user: &str, wrap: bool) -> Result<SwapTransactionPayload> {
            assert!(wrap);
            self.swap_calls.lock().unwrap().push(quote.input_mint().to_string());
            Ok(SwapTransactionPayload::from_bytes(vec![1], quote.input_mint().to_string(), user))
        }
    }

    #[derive(Default)]
    struct FakeSubmitter {
        reject: HashSet<String>,
        unconfirmed: bool,
        cancel_after_first: Option<CancellationToken>,
        submitted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Submitter for FakeSubmitter {
        async fn submit(&self, payload: SwapTransactionPayload) -> Result<Signature> {
            let mint = payload.input_mint().to_string();
            if self.reject.contains(&mint) {
                return Err(SwapError::SignerRejected("user declined".into()));
            }
            self.submitted.lock().unwrap().push(mint);
            if let Some(token) = &self.cancel_after_first {
                token.cancel();
            }
            Ok(Signature::new_unique())
        }

        async fn confirm(&self, signature: &Signature) -> Result<()> {
            if self.unconfirmed {
                return Err(SwapError::ConfirmationFailed {
                    signature: signature.to_string(),
                    reason: "blockhash expired".into(),
                });
            }
            Ok(())
        }
    }

    fn holding(mint: &str, amount: &str, decimals: u8) -> AssetHolding {
        AssetHolding {
            mint_address: mint.into(),
            amount: Decimal::from_str(amount).unwrap(),
            decimals,
            symbol: None,
        }
    }

    fn engine(venue: FakeVenue, submitter: FakeSubmitter) -> Engine<FakeVenue, FakeSubmitter> {
        Engine::new(venue, submitter, WALLET.into(), EngineOptions::default())
    }

    fn statuses(outcomes: &[SwapOutcome]) -> Vec<OutcomeStatus> {
        outcomes.iter().map(|o| o.status).collect()
    }

    #[tokio::test]
    async fn zero_balance_is_filtered_before_any_request() {
        let e = engine(FakeVenue::default(), FakeSubmitter::default());
        let holdings = vec![holding("MintA", "2.0", 6), holding("MintB", "0", 9)];

        let outcomes = e.swap_all(&holdings, "MintC", 50, &CancellationToken::new()).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].mint_address, "MintA");
        assert_eq!(outcomes[0].status, OutcomeStatus::Success);
        assert!(outcomes[0].signature.is_some());

        let quotes = e.venue.quote_calls.lock().unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].amount, "2000000");
        assert_eq!(quotes[0].output_mint, "MintC");
        assert!(quotes[0].restrict_intermediate_tokens);
        assert_eq!(*e.submitter.submitted.lock().unwrap(), vec!["MintA".to_string()]);
    }

    #[tokio::test]
    async fn output_mint_itself_is_not_swapped() {
        let e = engine(FakeVenue::default(), FakeSubmitter::default());
        let holdings = vec![holding(NATIVE_MINT, "1", 9), holding(USDC_MINT, "3", 6)];

        let outcomes = e.swap_all(&holdings, NATIVE_MINT, 50, &CancellationToken::new()).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].mint_address, USDC_MINT);
    }

    #[tokio::test]
    async fn no_route_item_is_skipped_and_batch_continues() {
        let venue = FakeVenue { no_route: HashSet::from(["MintB".to_string()]), ..Default::default() };
        let e = engine(venue, FakeSubmitter::default());
        let holdings = vec![holding("MintA", "1", 6), holding("MintB", "1", 6), holding("MintC", "1", 6)];

        let outcomes = e.swap_all(&holdings, NATIVE_MINT, 50, &CancellationToken::new()).await;

        assert_eq!(
            statuses(&outcomes),
            vec![OutcomeStatus::Success, OutcomeStatus::NoRoute, OutcomeStatus::Success]
        );
        // the unroutable quote never reached /swap
        assert_eq!(*e.venue.swap_calls.lock().unwrap(), vec!["MintA".to_string(), "MintC".to_string()]);
    }

    #[tokio::test]
    async fn signer_rejection_fails_only_that_item() {
        let submitter = FakeSubmitter { reject: HashSet::from(["MintA".to_string()]), ..Default::default() };
        let e = engine(FakeVenue::default(), submitter);
        let holdings = vec![holding("MintA", "1", 6), holding("MintB", "1", 6)];

        let outcomes = e.swap_all(&holdings, NATIVE_MINT, 50, &CancellationToken::new()).await;

        assert_eq!(statuses(&outcomes), vec![OutcomeStatus::Failed, OutcomeStatus::Success]);
        assert!(outcomes[0].error_detail.as_deref().unwrap().contains("user declined"));
        assert!(outcomes[0].signature.is_none());
    }

    #[tokio::test]
    async fn dust_amount_fails_without_quoting() {
        let e = engine(FakeVenue::default(), FakeSubmitter::default());
        let holdings = vec![holding("MintA", "0.0000001", 6), holding("MintB", "1", 6)];

        let outcomes = e.swap_all(&holdings, NATIVE_MINT, 50, &CancellationToken::new()).await;

        assert_eq!(statuses(&outcomes), vec![OutcomeStatus::Failed, OutcomeStatus::Success]);
        assert_eq!(e.venue.quote_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_between_items() {
        let token = CancellationToken::new();
        let submitter = FakeSubmitter { cancel_after_first: Some(token.clone()), ..Default::default() };
        let e = engine(FakeVenue::default(), submitter);
        let holdings = vec![holding("MintA", "1", 6), holding("MintB", "1", 6), holding("MintC", "1", 6)];

        let outcomes = e.swap_all(&holdings, NATIVE_MINT, 50, &token).await;

        assert_eq!(
            statuses(&outcomes),
            vec![OutcomeStatus::Success, OutcomeStatus::Cancelled, OutcomeStatus::Cancelled]
        );
        assert_eq!(e.venue.quote_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quote_single_reports_human_output() {
        let e = engine(FakeVenue::default(), FakeSubmitter::default());
        let req = QuoteRequest::new(USDC_MINT, NATIVE_MINT, 1_500_000, 50).unwrap();

        let preview = e.quote_single(req, 9).await.unwrap();

        assert_eq!(preview.quote.out_amount(), 3_000_000);
        assert_eq!(preview.estimated_output, Decimal::from_str("0.003").unwrap());
    }

    #[tokio::test]
    async fn quote_single_surfaces_no_route() {
        let venue = FakeVenue { no_route: HashSet::from([USDC_MINT.to_string()]), ..Default::default() };
        let e = engine(venue, FakeSubmitter::default());
        let req = QuoteRequest::new(USDC_MINT, NATIVE_MINT, 1, 50).unwrap();

        assert!(e.quote_single(req, 9).await.unwrap_err().is_no_route());
    }

    #[tokio::test]
    async fn execute_single_surfaces_first_error() {
        let submitter = FakeSubmitter { unconfirmed: true, ..Default::default() };
        let e = engine(FakeVenue::default(), submitter);
        let req = QuoteRequest::new(USDC_MINT, NATIVE_MINT, 1_000, 50).unwrap();
        let preview = e.quote_single(req, 9).await.unwrap();

        let err = e.execute_single(preview.quote).await.unwrap_err();
        assert!(matches!(err, SwapError::ConfirmationFailed { .. }));
    }

    #[tokio::test]
    async fn execute_single_returns_signature() {
        let e = engine(FakeVenue::default(), FakeSubmitter::default());
        let req = QuoteRequest::new(USDC_MINT, NATIVE_MINT, 1_000, 50).unwrap();
        let preview = e.quote_single(req, 9).await.unwrap();

        let sig = e.execute_single(preview.quote).await.unwrap();
        assert_ne!(sig, Signature::default());
        assert_eq!(*e.venue.swap_calls.lock().unwrap(), vec![USDC_MINT.to_string()]);
    }
}
