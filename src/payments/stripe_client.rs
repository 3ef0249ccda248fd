use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::domain::value_objects::payments::{BillingContext, CardDetails};

const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Minimal Stripe client built on reqwest. The secret API key never leaves
/// server configuration; card data passes through to the tokenization call
/// and is never persisted or logged.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    currency: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway rejected the card itself (bad number, expired,
    /// insufficient funds). The admin must fix the card input; retrying the
    /// same token is pointless.
    #[error("card rejected: {message}")]
    CardRejected {
        code: Option<String>,
        message: String,
    },
    /// Transport-level failure before a usable gateway response arrived.
    #[error("payment gateway unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("invalid charge amount: {0}")]
    InvalidAmount(i64),
    #[error("unexpected gateway response: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeStatus {
    Succeeded,
    Failed,
}

/// Synchronous outcome of a confirmation call. `Succeeded` is reported only
/// when the gateway response body says so; it is never inferred from the
/// absence of an error.
#[derive(Debug, Clone)]
pub struct ChargeResult {
    pub status: ChargeStatus,
    pub gateway_transaction_id: String,
    pub failure_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub intent_id: String,
    /// Single-use secret authorizing the confirmation of this one intent.
    pub confirmation_secret: String,
}

/// A gateway-confirmed charge as seen by the reconciliation pass.
#[derive(Debug, Clone)]
pub struct GatewayCharge {
    pub transaction_id: String,
    pub amount_minor: i64,
    pub created: i64,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentMethodResp {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentResp {
    id: String,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfirmResp {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct IntentListResp {
    data: Vec<IntentObject>,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct IntentObject {
    id: String,
    amount: i64,
    status: String,
    created: i64,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl StripeClient {
    pub fn new(secret_key: String, currency: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            currency,
        }
    }

    fn transport_error(context: &str, err: &reqwest::Error) -> GatewayError {
        let reason = if err.is_timeout() {
            format!("{context}: request timed out")
        } else if err.is_connect() {
            format!("{context}: connection failed")
        } else {
            format!("{context}: request failed")
        };
        GatewayError::Unavailable { reason }
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, GatewayError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        Err(classify_error_body(
            status.as_u16(),
            &body,
            context,
            request_id,
        ))
    }

    /// Creates a payment-method token bound to the card. No ledger side
    /// effects; a rejected card surfaces as `CardRejected`.
    pub async fn create_payment_method(
        &self,
        card: &CardDetails,
        billing: &BillingContext,
    ) -> Result<String, GatewayError> {
        // https://stripe.com/docs/api/payment_methods/create
        let body = [
            ("type".to_string(), "card".to_string()),
            ("card[number]".to_string(), card.number.clone()),
            ("card[exp_month]".to_string(), card.exp_month.to_string()),
            ("card[exp_year]".to_string(), card.exp_year.to_string()),
            ("card[cvc]".to_string(), card.cvc.clone()),
            ("billing_details[name]".to_string(), billing.name.clone()),
            ("billing_details[email]".to_string(), billing.email.clone()),
        ];

        let resp = self
            .http
            .post(format!("{STRIPE_API_BASE}/v1/payment_methods"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .form(&body)
            .send()
            .await
            .map_err(|err| Self::transport_error("create payment method", &err))?;
        let resp = Self::ensure_success(resp, "create payment method").await?;

        let parsed: PaymentMethodResp = resp
            .json()
            .await
            .map_err(|err| GatewayError::Protocol(format!("payment method body: {err}")))?;
        Ok(parsed.id)
    }

    /// Creates a payment intent for the given amount and returns its
    /// single-use confirmation secret. Secrets are short-lived; a fresh
    /// intent is created per attempt and never cached.
    pub async fn create_payment_intent(
        &self,
        amount_minor: i64,
        metadata: &HashMap<String, String>,
    ) -> Result<PaymentIntent, GatewayError> {
        if amount_minor <= 0 {
            return Err(GatewayError::InvalidAmount(amount_minor));
        }

        // https://stripe.com/docs/api/payment_intents/create
        let mut body = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), self.currency.clone()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
        ];
        for (key, value) in metadata {
            body.push((format!("metadata[{key}]"), value.clone()));
        }

        let resp = self
            .http
            .post(format!("{STRIPE_API_BASE}/v1/payment_intents"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .form(&body)
            .send()
            .await
            .map_err(|err| Self::transport_error("create payment intent", &err))?;
        let resp = Self::ensure_success(resp, "create payment intent").await?;

        let parsed: PaymentIntentResp = resp
            .json()
            .await
            .map_err(|err| GatewayError::Protocol(format!("payment intent body: {err}")))?;
        let confirmation_secret = parsed
            .client_secret
            .ok_or_else(|| GatewayError::Protocol("client_secret missing on intent".to_string()))?;

        Ok(PaymentIntent {
            intent_id: parsed.id,
            confirmation_secret,
        })
    }

    /// Submits the confirmation: the one call where money moves. The gateway
    /// response body is the sole source of truth for whether the charge
    /// happened; a card decline here is a `Failed` result, not an error.
    pub async fn confirm_payment_intent(
        &self,
        confirmation_secret: &str,
        payment_method_id: &str,
        billing: &BillingContext,
    ) -> Result<ChargeResult, GatewayError> {
        let intent_id = intent_id_from_secret(confirmation_secret)?;

        // https://stripe.com/docs/api/payment_intents/confirm
        let body = [
            ("payment_method".to_string(), payment_method_id.to_string()),
            ("client_secret".to_string(), confirmation_secret.to_string()),
            ("receipt_email".to_string(), billing.email.clone()),
        ];

        let resp = self
            .http
            .post(format!(
                "{STRIPE_API_BASE}/v1/payment_intents/{intent_id}/confirm"
            ))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .form(&body)
            .send()
            .await
            .map_err(|err| Self::transport_error("confirm payment intent", &err))?;

        let resp = match Self::ensure_success(resp, "confirm payment intent").await {
            Ok(resp) => resp,
            // The charge was attempted and declined. Terminal for this
            // intent, but not a transport failure.
            Err(GatewayError::CardRejected { message, .. }) => {
                return Ok(ChargeResult {
                    status: ChargeStatus::Failed,
                    gateway_transaction_id: intent_id.to_string(),
                    failure_message: Some(message),
                });
            }
            Err(err) => return Err(err),
        };

        let parsed: ConfirmResp = resp
            .json()
            .await
            .map_err(|err| GatewayError::Protocol(format!("confirm body: {err}")))?;

        if parsed.status == "succeeded" {
            Ok(ChargeResult {
                status: ChargeStatus::Succeeded,
                gateway_transaction_id: parsed.id,
                failure_message: None,
            })
        } else {
            Ok(ChargeResult {
                status: ChargeStatus::Failed,
                gateway_transaction_id: parsed.id,
                failure_message: Some(format!("charge ended in state {}", parsed.status)),
            })
        }
    }

    /// Pages through the gateway's succeeded intents created after `since`.
    /// Consumed by the orphaned-charge reconciliation pass.
    pub async fn list_succeeded_charges_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<GatewayCharge>, GatewayError> {
        let mut charges = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            // https://stripe.com/docs/api/payment_intents/list
            let mut query = vec![
                ("limit".to_string(), "100".to_string()),
                ("created[gte]".to_string(), since.timestamp().to_string()),
            ];
            if let Some(after) = &starting_after {
                query.push(("starting_after".to_string(), after.clone()));
            }

            let resp = self
                .http
                .get(format!("{STRIPE_API_BASE}/v1/payment_intents"))
                .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
                .query(&query)
                .send()
                .await
                .map_err(|err| Self::transport_error("list payment intents", &err))?;
            let resp = Self::ensure_success(resp, "list payment intents").await?;

            let page: IntentListResp = resp
                .json()
                .await
                .map_err(|err| GatewayError::Protocol(format!("intent list body: {err}")))?;

            starting_after = page.data.last().map(|intent| intent.id.clone());
            for intent in page.data {
                if intent.status == "succeeded" {
                    charges.push(GatewayCharge {
                        transaction_id: intent.id,
                        amount_minor: intent.amount,
                        created: intent.created,
                        metadata: intent.metadata,
                    });
                }
            }

            if !page.has_more {
                break;
            }
            if starting_after.is_none() {
                warn!("gateway reported has_more with an empty page; stopping pagination");
                break;
            }
        }

        Ok(charges)
    }
}

/// Confirmation secrets have the form `pi_<id>_secret_<nonce>`; the intent id
/// is the prefix before `_secret`.
pub(crate) fn intent_id_from_secret(secret: &str) -> Result<&str, GatewayError> {
    let intent_id = secret
        .split_once("_secret")
        .map(|(id, _)| id)
        .ok_or_else(|| {
            GatewayError::Protocol("confirmation secret has no _secret suffix".to_string())
        })?;

    if intent_id.is_empty() || !intent_id.starts_with("pi_") {
        return Err(GatewayError::Protocol(
            "confirmation secret does not name a payment intent".to_string(),
        ));
    }
    Ok(intent_id)
}

fn classify_error_body(
    status: u16,
    body: &str,
    context: &str,
    request_id: Option<String>,
) -> GatewayError {
    let details = serde_json::from_str::<StripeErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error);

    let (error_type, code, message, param, decline_code) = match details {
        Some(d) => (d.type_, d.code, d.message, d.param, d.decline_code),
        None => (None, None, None, None, None),
    };

    error!(
        status,
        gateway_request_id = ?request_id,
        gateway_error_type = ?error_type,
        gateway_error_code = ?code,
        gateway_error_param = ?param,
        gateway_error_message = ?message,
        gateway_decline_code = ?decline_code,
        context,
        "stripe api request failed"
    );

    if error_type.as_deref() == Some("card_error") {
        return GatewayError::CardRejected {
            code: decline_code.or(code),
            message: message.unwrap_or_else(|| "card was declined".to_string()),
        };
    }

    GatewayError::Protocol(format!(
        "{context} failed with status {status} (request_id={request_id:?})"
    ))
}
