use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;

use crate::domain::BatchSummary;

#[derive(Clone)]
pub struct Notifier {
    slack_webhook_url: Option<String>,
    http: Client,
}

#[derive(Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
}

impl Notifier {
    pub fn new(slack_webhook_url: Option<String>) -> Self {
        Self { slack_webhook_url, http: Client::new() }
    }

    pub async fn alert(&self, text: &str) -> Result<()> {
        let Some(url) = self.slack_webhook_url.as_deref() else {
            return Ok(());
        };

        let resp = self
            .http
            .post(url)
            .json(&SlackPayload { text })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow!("slack webhook failed: {}", resp.status()));
        }

        Ok(())
    }
}

pub fn batch_message(output_mint: &str, summary: &BatchSummary) -> String {
    if summary.total() == 0 {
        return "Flush swap: nothing to swap.".to_string();
    }
    format!("Flush swap into {output_mint}: {summary}.")
}
