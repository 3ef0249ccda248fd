use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::value_objects::enums::payment_request_statuses::PaymentRequestStatus;
use crate::infrastructure::postgres::schema::payment_requests;

/// A salary payment request, the central row of the payment ledger.
///
/// `amount_minor` is frozen at request time; later salary updates never touch
/// it. `gateway_transaction_id` is unique and serves as the idempotency key
/// for ledger inserts. Rows are never deleted.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_requests)]
pub struct PaymentRequestEntity {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub employee_email: String,
    pub amount_minor: i64,
    pub month: i32,
    pub year: i32,
    pub gateway_payment_method_id: String,
    pub gateway_transaction_id: String,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub payment_date: Option<DateTime<Utc>>,
}

impl PaymentRequestEntity {
    /// Unknown status strings count as failed.
    pub fn status(&self) -> PaymentRequestStatus {
        PaymentRequestStatus::from_str(&self.status).unwrap_or(PaymentRequestStatus::Failed)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_requests)]
pub struct InsertPaymentRequestEntity {
    pub employee_id: Uuid,
    pub employee_name: String,
    pub employee_email: String,
    pub amount_minor: i64,
    pub month: i32,
    pub year: i32,
    pub gateway_payment_method_id: String,
    pub gateway_transaction_id: String,
    pub status: String,
    pub requested_at: DateTime<Utc>,
}

// NewPaymentRequestEntity is the application-facing alias for inserting rows
// into `payment_requests`.
pub type NewPaymentRequestEntity = InsertPaymentRequestEntity;
