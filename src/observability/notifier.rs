use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::warn;
use url::Url;

use super::discord::DiscordWebhookProvider;

/// An operator-facing event: something a human running payroll needs to see
/// even when nobody is tailing the logs (declined charges, orphaned charges,
/// approval conflicts).
#[derive(Clone, Debug)]
pub struct OperatorAlert {
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub detail: String,
    pub fields: BTreeMap<String, String>,
}

impl OperatorAlert {
    pub fn new(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            title: title.into(),
            detail: detail.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
pub trait AlertProvider: Send + Sync {
    async fn send(&self, alert: &OperatorAlert) -> Result<()>;
    fn provider_name(&self) -> &'static str;
}

/// Fans alerts out to the configured providers from a background task so the
/// payment path never blocks on a webhook.
#[derive(Clone)]
pub struct OperatorNotifier {
    tx: mpsc::Sender<OperatorAlert>,
}

impl OperatorNotifier {
    pub fn new(providers: Vec<Arc<dyn AlertProvider>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<OperatorAlert>(256);

        tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                for provider in &providers {
                    if let Err(error) = provider.send(&alert).await {
                        warn!(
                            provider = provider.provider_name(),
                            error = %error,
                            "Alert provider failed"
                        );
                    }
                }
            }
        });

        Self { tx }
    }

    /// Builds a notifier from `DISCORD_WEBHOOK_URL` when it is set and
    /// parses; misconfiguration is logged, never fatal.
    pub fn from_env() -> Option<Self> {
        let raw = std::env::var("DISCORD_WEBHOOK_URL").ok()?;
        if raw.trim().is_empty() {
            return None;
        }
        match Url::parse(&raw) {
            Ok(url) => Some(Self::new(vec![Arc::new(DiscordWebhookProvider::new(url))])),
            Err(err) => {
                // Do not include the raw URL in logs (webhook URLs contain secrets).
                warn!(
                    parse_error = %err,
                    "DISCORD_WEBHOOK_URL is set but invalid; operator alerts disabled"
                );
                None
            }
        }
    }

    pub fn try_notify(&self, alert: OperatorAlert) {
        match self.tx.try_send(alert) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Alert queue full; dropping alert");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Alert queue closed; dropping alert");
            }
        }
    }
}
