use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use url::Url;

use super::notifier::{AlertProvider, OperatorAlert};

pub struct DiscordWebhookProvider {
    webhook_url: Url,
    client: Client,
}

impl DiscordWebhookProvider {
    pub fn new(webhook_url: Url) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(3))
            .build()
            .expect("reqwest client must build");

        Self {
            webhook_url,
            client,
        }
    }

    fn format_content(&self, alert: &OperatorAlert) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "**{}** `{}`",
            alert.title,
            alert.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        if !alert.detail.trim().is_empty() {
            lines.push(format!("> {}", alert.detail.trim()));
        }
        for (key, value) in &alert.fields {
            lines.push(format!("- `{}` = `{}`", key, value));
        }

        truncate_for_discord(lines.join("\n"))
    }
}

#[async_trait]
impl AlertProvider for DiscordWebhookProvider {
    async fn send(&self, alert: &OperatorAlert) -> Result<()> {
        let content = self.format_content(alert);

        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(sanitize_reqwest_error)?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(anyhow!(
            "discord webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn provider_name(&self) -> &'static str {
        "discord"
    }
}

fn sanitize_reqwest_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("discord webhook request timed out");
    }
    if error.is_connect() {
        return anyhow!("discord webhook connection failed");
    }
    anyhow!("discord webhook request failed")
}

fn truncate_for_discord(mut content: String) -> String {
    const LIMIT: usize = 2000;
    const SUFFIX: &str = "\n… (truncated)";

    if content.chars().count() <= LIMIT {
        return content;
    }

    let allowed = LIMIT.saturating_sub(SUFFIX.chars().count());
    let truncated: String = content.chars().take(allowed).collect();
    content.clear();
    content.push_str(&truncated);
    content.push_str(SUFFIX);
    content
}
