use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::payment_requests::{
    NewPaymentRequestEntity, PaymentRequestEntity,
};
use crate::domain::value_objects::enums::payment_request_statuses::PaymentRequestStatus;
use crate::domain::value_objects::pay_periods::PayPeriod;

/// Result of an idempotent ledger insert.
#[derive(Debug)]
pub enum RecordPaymentOutcome {
    Inserted(PaymentRequestEntity),
    /// A row with this gateway transaction id already exists; the retry is
    /// answered with the original row.
    AlreadyRecorded(PaymentRequestEntity),
    /// Another non-terminal request exists for the same employee and period.
    DuplicateActivePeriod,
}

/// Result of the payroll approval compare-and-set.
#[derive(Debug)]
pub enum ApprovalOutcome {
    Approved(PaymentRequestEntity),
    AlreadyPaid,
    /// The row exists but is not in the `recorded` state.
    InvalidState(PaymentRequestStatus),
    NotFound,
}

/// Card input forwarded verbatim to the gateway's tokenization call. Never
/// persisted; the Debug form redacts everything sensitive.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    pub number: String,
    pub exp_month: i32,
    pub exp_year: i32,
    pub cvc: String,
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &"<redacted>")
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cvc", &"<redacted>")
            .finish()
    }
}

/// Billing identity attached to the charge on the gateway side.
#[derive(Debug, Clone)]
pub struct BillingContext {
    pub name: String,
    pub email: String,
}

/// Body of `POST /payment`: a charge already confirmed at the gateway,
/// submitted for ledger persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentModel {
    pub employee_id: Uuid,
    pub name: String,
    pub email: String,
    pub amount: i64,
    pub month: i32,
    pub year: i32,
    pub gateway_payment_method_id: String,
    pub gateway_transaction_id: String,
    pub requested_at: DateTime<Utc>,
}

impl RecordPaymentModel {
    pub fn to_entity(&self, period: PayPeriod) -> NewPaymentRequestEntity {
        NewPaymentRequestEntity {
            employee_id: self.employee_id,
            employee_name: self.name.clone(),
            employee_email: self.email.clone(),
            amount_minor: self.amount,
            month: period.month(),
            year: period.year(),
            gateway_payment_method_id: self.gateway_payment_method_id.clone(),
            gateway_transaction_id: self.gateway_transaction_id.clone(),
            status: PaymentRequestStatus::Recorded.to_string(),
            requested_at: self.requested_at,
        }
    }
}

/// Body of `POST /payments/initiate`: the server-side orchestration of the
/// full tokenize -> intent -> confirm -> record sequence.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentModel {
    pub employee_id: Uuid,
    pub month: i32,
    pub year: i32,
    pub card: CardDetails,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentModel {
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    pub confirmation_secret: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequestDto {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub name: String,
    pub email: String,
    pub amount: i64,
    pub month: i32,
    pub year: i32,
    pub transaction_id: String,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub payment_date: Option<DateTime<Utc>>,
}

impl From<PaymentRequestEntity> for PaymentRequestDto {
    fn from(entity: PaymentRequestEntity) -> Self {
        let status = entity.status().to_string();
        Self {
            id: entity.id,
            employee_id: entity.employee_id,
            name: entity.employee_name,
            email: entity.employee_email,
            amount: entity.amount_minor,
            month: entity.month,
            year: entity.year,
            transaction_id: entity.gateway_transaction_id,
            status,
            requested_at: entity.requested_at,
            payment_date: entity.payment_date,
        }
    }
}

/// Paginated employee-facing history page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistoryDto {
    pub payments: Vec<PaymentRequestDto>,
    pub total: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistoryQuery {
    pub email: String,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentResponse {
    pub inserted_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
    pub inserted_id: Uuid,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovePaymentModel {
    pub id: Uuid,
}
