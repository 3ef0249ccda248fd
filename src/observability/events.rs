use async_trait::async_trait;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::notifier::{OperatorAlert, OperatorNotifier};
use crate::application::usecases::payments::PaymentEventsObserver;
use crate::domain::entities::payment_requests::PaymentRequestEntity;
use crate::domain::value_objects::pay_periods::PayPeriod;

/// Default observer wiring: ledger/approval successes are logged as cache
/// invalidation signals for the history and payroll views, and terminal
/// failures fan out to the operator notifier.
pub struct AlertingPaymentEvents {
    notifier: Option<OperatorNotifier>,
}

impl AlertingPaymentEvents {
    pub fn new(notifier: Option<OperatorNotifier>) -> Self {
        Self { notifier }
    }

    fn alert(&self, alert: OperatorAlert) {
        if let Some(notifier) = &self.notifier {
            notifier.try_notify(alert);
        }
    }
}

#[async_trait]
impl PaymentEventsObserver for AlertingPaymentEvents {
    async fn payment_recorded(&self, request: PaymentRequestEntity) {
        info!(
            request_id = %request.id,
            employee_email = %request.employee_email,
            invalidates = "payment-history, payroll",
            "events: payment request recorded"
        );
    }

    async fn payment_approved(&self, request: PaymentRequestEntity) {
        info!(
            request_id = %request.id,
            employee_email = %request.employee_email,
            payment_date = ?request.payment_date,
            invalidates = "payment-history, payroll",
            "events: payment request approved"
        );
    }

    async fn charge_declined(&self, employee_id: Uuid, period: PayPeriod, reason: String) {
        warn!(
            %employee_id,
            %period,
            reason = %reason,
            "events: charge declined"
        );
        self.alert(
            OperatorAlert::new("Salary charge declined", reason)
                .field("employee_id", employee_id.to_string())
                .field("period", period.to_string()),
        );
    }

    async fn approval_conflict(&self, request_id: Uuid, detail: String) {
        warn!(
            %request_id,
            detail = %detail,
            "events: payroll approval conflict"
        );
        self.alert(
            OperatorAlert::new("Payroll approval conflict", detail)
                .field("request_id", request_id.to_string()),
        );
    }

    async fn orphaned_charge_recovered(&self, transaction_id: String) {
        warn!(
            transaction_id = %transaction_id,
            "events: orphaned charge recovered"
        );
        self.alert(
            OperatorAlert::new(
                "Orphaned charge recovered",
                "A confirmed charge without a ledger row was re-recorded by reconciliation.",
            )
            .field("transaction_id", transaction_id),
        );
    }

    async fn orphaned_charge_flagged(&self, transaction_id: String, detail: String) {
        error!(
            transaction_id = %transaction_id,
            detail = %detail,
            "events: orphaned charge needs manual review"
        );
        self.alert(
            OperatorAlert::new("Orphaned charge needs manual review", detail)
                .field("transaction_id", transaction_id),
        );
    }
}
