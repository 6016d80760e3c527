//! In-process `RpcSender` so the nonblocking `RpcClient` can be driven
//! without a node, on tokio's paused clock.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use solana_client::client_error::Result as ClientResult;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::RpcClientConfig;
use solana_client::rpc_request::RpcRequest;
use solana_client::rpc_sender::{RpcSender, RpcTransportStats};
use tokio::time::Instant;

pub type CallLog = Arc<Mutex<Vec<(RpcRequest, Instant)>>>;

type Responder = Box<dyn Fn(RpcRequest) -> Value + Send + Sync>;

struct ScriptedSender {
    calls: CallLog,
    respond: Responder,
}

#[async_trait]
impl RpcSender for ScriptedSender {
    async fn send(&self, request: RpcRequest, _params: Value) -> ClientResult<Value> {
        self.calls.lock().unwrap().push((request, Instant::now()));
        Ok((self.respond)(request))
    }

    fn get_transport_stats(&self) -> RpcTransportStats {
        RpcTransportStats::default()
    }

    fn url(&self) -> String {
        "scripted".to_string()
    }
}

/// Client whose every request is answered by `respond`. The log records
/// each request and the (tokio) instant it was sent.
pub fn scripted_client(respond: impl Fn(RpcRequest) -> Value + Send + Sync + 'static) -> (Arc<RpcClient>, CallLog) {
    let calls = CallLog::default();
    let sender = ScriptedSender { calls: calls.clone(), respond: Box::new(respond) };
    (Arc::new(RpcClient::new_sender(sender, RpcClientConfig::default())), calls)
}

/// Wraps `value` in the `{context, value}` envelope of RpcResult methods.
pub fn with_context(value: impl Serialize) -> Value {
    json!({ "context": { "slot": 1 }, "value": value })
}

pub fn requests(calls: &CallLog) -> Vec<RpcRequest> {
    calls.lock().unwrap().iter().map(|(r, _)| *r).collect()
}
