use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payment_requests::{
    NewPaymentRequestEntity, PaymentRequestEntity,
};
use crate::domain::value_objects::{
    pay_periods::PayPeriod,
    payments::{ApprovalOutcome, RecordPaymentOutcome},
};

/// The payment ledger: the single durable source of truth for salary payment
/// requests. Writes are serialized per employee and period through the
/// database invariants, not through client-side locking.
#[automock]
#[async_trait]
pub trait PaymentRequestRepository {
    /// Idempotent insert keyed on `gateway_transaction_id`. One transaction
    /// covers the duplicate-period check and the insert itself.
    async fn record_payment(
        &self,
        payment: NewPaymentRequestEntity,
    ) -> Result<RecordPaymentOutcome>;

    /// True when a non-terminal request already exists for this employee and
    /// period.
    async fn has_active_request(&self, employee_id: Uuid, period: PayPeriod) -> Result<bool>;

    async fn find_by_transaction_id(
        &self,
        gateway_transaction_id: &str,
    ) -> Result<Option<PaymentRequestEntity>>;

    /// Compare-and-set: `recorded` with unset payment_date becomes
    /// `approved_paid` stamped with `paid_at`. Anything else is reported in
    /// the outcome without touching the row.
    async fn approve_and_pay(
        &self,
        request_id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> Result<ApprovalOutcome>;

    /// Newest-first page of an employee's history plus the total row count.
    async fn list_by_email(
        &self,
        email: &str,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<PaymentRequestEntity>, i64)>;

    /// Full ledger for the admin payroll view, unapproved rows first.
    async fn list_all(&self) -> Result<Vec<PaymentRequestEntity>>;
}
