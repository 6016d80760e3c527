use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcSendTransactionConfig, RpcSimulateTransactionConfig};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::TransactionStatus;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::{Result, SwapError};
use crate::jupiter::SwapTransactionPayload;
use crate::rate_limit::RateLimiter;

/// External signer. May prompt a human, may refuse.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;
    async fn sign(&self, tx: VersionedTransaction) -> Result<VersionedTransaction>;
}

/// Signs with a local keypair file.
pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let keypair = read_keypair_file(path)
            .map_err(|e| SwapError::SignerUnavailable(format!("{path}: {e}")))?;
        Ok(Self::new(keypair))
    }
}

#[async_trait]
impl TransactionSigner for KeypairSigner {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign(&self, tx: VersionedTransaction) -> Result<VersionedTransaction> {
        VersionedTransaction::try_new(tx.message, &[&self.keypair])
            .map_err(|e| SwapError::SignerRejected(e.to_string()))
    }
}

/// Signs, broadcasts and confirms swap transactions.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, payload: SwapTransactionPayload) -> Result<Signature>;
    async fn confirm(&self, signature: &Signature) -> Result<()>;
}

/// Upper bound on confirmation polling.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(60), poll_interval: Duration::from_secs(2) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationState {
    Pending,
    Confirmed,
    Failed(String),
}

pub fn confirmation_state(status: Option<&TransactionStatus>) -> ConfirmationState {
    match status {
        None => ConfirmationState::Pending,
        Some(s) => match &s.err {
            Some(err) => ConfirmationState::Failed(format!("{err:?}")),
            None if s.satisfies_commitment(CommitmentConfig::confirmed()) => ConfirmationState::Confirmed,
            None => ConfirmationState::Pending,
        },
    }
}

pub struct RpcSubmitter<S> {
    rpc: Arc<RpcClient>,
    limiter: Arc<RateLimiter>,
    signer: Arc<S>,
    policy: ConfirmPolicy,
    dry_run: bool,
}

impl<S: TransactionSigner> RpcSubmitter<S> {
    pub fn new(
        rpc: Arc<RpcClient>,
        limiter: Arc<RateLimiter>,
        signer: Arc<S>,
        policy: ConfirmPolicy,
        dry_run: bool,
    ) -> Self {
        Self { rpc, limiter, signer, policy, dry_run }
    }

    /// Decode and sign. No network.
    async fn prepare(&self, payload: SwapTransactionPayload) -> Result<VersionedTransaction> {
        let expected = self.signer.pubkey().to_string();
        if payload.requester() != expected {
            return Err(SwapError::InvalidRequest(format!(
                "payload built for {} but signer is {expected}",
                payload.requester()
            )));
        }
        let tx: VersionedTransaction = bincode::deserialize(&payload.into_bytes())?;
        debug!(signer = %expected, "submitter.sign.request");
        self.signer.sign(tx).await
    }
}

#[async_trait]
impl<S: TransactionSigner> Submitter for RpcSubmitter<S> {
    async fn submit(&self, payload: SwapTransactionPayload) -> Result<Signature> {
        let input_mint = payload.input_mint().to_string();
        let tx = self.prepare(payload).await?;
        let signature = tx
            .signatures
            .first()
            .copied()
            .ok_or_else(|| SwapError::Decode("transaction carries no signatures".into()))?;

        if self.dry_run {
            self.limiter.acquire().await;
            let sim = self
                .rpc
                .simulate_transaction_with_config(
                    &tx,
                    RpcSimulateTransactionConfig {
                        sig_verify: false,
                        replace_recent_blockhash: true,
                        commitment: Some(CommitmentConfig::processed()),
                        ..RpcSimulateTransactionConfig::default()
                    },
                )
                .await?;
            if let Some(err) = sim.value.err {
                return Err(SwapError::RequestFailed {
                    status: None,
                    body: sim.value.logs.map(|l| l.join("\n")),
                    message: format!("simulateTransaction failed: {err:?}"),
                });
            }
            info!(%input_mint, %signature, "dry_run: simulation ok, skipping send");
            return Ok(signature);
        }

        self.limiter.acquire().await;
        let sent = self
            .rpc
            .send_transaction_with_config(
                &tx,
                RpcSendTransactionConfig {
                    preflight_commitment: Some(CommitmentConfig::confirmed().commitment),
                    ..RpcSendTransactionConfig::default()
                },
            )
            .await?;
        info!(%input_mint, signature = %sent, "submitter.sent");
        Ok(sent)
    }

    async fn confirm(&self, signature: &Signature) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let started = Instant::now();
        loop {
            self.limiter.acquire().await;
            let statuses = self.rpc.get_signature_statuses(&[*signature]).await?.value;
            match confirmation_state(statuses.first().and_then(Option::as_ref)) {
                ConfirmationState::Confirmed => {
                    info!(%signature, elapsed_ms = started.elapsed().as_millis() as u64, "submitter.confirmed");
                    return Ok(());
                }
                ConfirmationState::Failed(reason) => {
                    warn!(%signature, %reason, "submitter.confirm.failed");
                    return Err(SwapError::ConfirmationFailed { signature: signature.to_string(), reason });
                }
                ConfirmationState::Pending => {}
            }
            if started.elapsed() >= self.policy.timeout {
                return Err(SwapError::ConfirmationTimeout {
                    signature: signature.to_string(),
                    waited: started.elapsed(),
                });
            }
            sleep(self.policy.poll_interval).await;
        }
    }
}
