use std::time::Duration;

use thiserror::Error;

/// Failure taxonomy for one swap attempt.
///
/// `NoRouteFound` is the only non-fatal variant: a batch records it as a skip
/// and moves on. Everything else is surfaced directly on the single-swap path
/// and turned into a `Failed` outcome inside a batch.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("no route found for {input_mint} -> {output_mint}")]
    NoRouteFound { input_mint: String, output_mint: String },

    #[error("request failed: {message}{}", upstream_body(.body))]
    RequestFailed {
        status: Option<u16>,
        body: Option<String>,
        message: String,
    },

    #[error("signer rejected the transaction: {0}")]
    SignerRejected(String),

    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),

    #[error("transaction {signature} failed to confirm: {reason}")]
    ConfirmationFailed { signature: String, reason: String },

    #[error("transaction {signature} not confirmed after {waited:?}")]
    ConfirmationTimeout { signature: String, waited: Duration },

    #[error("invalid swap request: {0}")]
    InvalidRequest(String),

    #[error("could not decode swap transaction: {0}")]
    Decode(String),
}

impl SwapError {
    pub fn is_no_route(&self) -> bool {
        matches!(self, SwapError::NoRouteFound { .. })
    }

    /// HTTP failure with the upstream error body attached.
    pub fn http(status: u16, body: String) -> Self {
        let body = body.trim();
        SwapError::RequestFailed {
            status: Some(status),
            body: (!body.is_empty()).then(|| body.to_string()),
            message: format!("upstream returned HTTP {status}"),
        }
    }
}

impl From<reqwest::Error> for SwapError {
    fn from(err: reqwest::Error) -> Self {
        SwapError::RequestFailed {
            status: err.status().map(|s| s.as_u16()),
            body: None,
            message: err.to_string(),
        }
    }
}

impl From<solana_client::client_error::ClientError> for SwapError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        SwapError::RequestFailed {
            status: None,
            body: None,
            message: format!("rpc: {err}"),
        }
    }
}

impl From<base64::DecodeError> for SwapError {
    fn from(err: base64::DecodeError) -> Self {
        SwapError::Decode(format!("base64: {err}"))
    }
}

impl From<bincode::Error> for SwapError {
    fn from(err: bincode::Error) -> Self {
        SwapError::Decode(format!("bincode: {err}"))
    }
}

fn upstream_body(body: &Option<String>) -> String {
    body.as_deref().map(|b| format!(" ({b})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, SwapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_keeps_upstream_body() {
        let err = SwapError::http(400, r#"{"error":"Could not find any route"}"#.into());
        match &err {
            SwapError::RequestFailed { status, body, .. } => {
                assert_eq!(*status, Some(400));
                assert!(body.as_deref().unwrap().contains("Could not find any route"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.to_string().contains("HTTP 400"));
    }

    #[test]
    fn blank_body_is_dropped() {
        let err = SwapError::http(502, "  ".into());
        assert!(matches!(err, SwapError::RequestFailed { body: None, .. }));
    }

    #[test]
    fn only_no_route_is_a_skip() {
        let skip = SwapError::NoRouteFound { input_mint: "A".into(), output_mint: "B".into() };
        assert!(skip.is_no_route());
        assert!(!SwapError::SignerRejected("user declined".into()).is_no_route());
    }
}
