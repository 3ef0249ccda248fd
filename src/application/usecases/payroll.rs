use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::usecases::payments::{
    PaymentError, PaymentEventsObserver, UseCaseResult,
};
use crate::domain::{
    entities::payment_requests::PaymentRequestEntity,
    repositories::payment_requests::PaymentRequestRepository,
    value_objects::payments::ApprovalOutcome,
};

/// The administrative payout step. Purely an internal status transition: the
/// charge already happened during confirmation, so approval never touches
/// the gateway.
pub struct PayrollApprovalUseCase<P, N>
where
    P: PaymentRequestRepository + Send + Sync + 'static,
    N: PaymentEventsObserver + Send + Sync + 'static,
{
    payment_repo: Arc<P>,
    events: Arc<N>,
}

impl<P, N> PayrollApprovalUseCase<P, N>
where
    P: PaymentRequestRepository + Send + Sync + 'static,
    N: PaymentEventsObserver + Send + Sync + 'static,
{
    pub fn new(payment_repo: Arc<P>, events: Arc<N>) -> Self {
        Self {
            payment_repo,
            events,
        }
    }

    /// Marks a recorded request as paid. The repository performs the whole
    /// precondition check and update as one compare-and-set, so a concurrent
    /// double-click resolves to exactly one payment_date and one `AlreadyPaid`.
    pub async fn approve_and_pay(&self, request_id: Uuid) -> UseCaseResult<PaymentRequestEntity> {
        info!(%request_id, "payroll: approving salary payment");

        let outcome = self
            .payment_repo
            .approve_and_pay(request_id, Utc::now())
            .await
            .map_err(PaymentError::Internal)?;

        match outcome {
            ApprovalOutcome::Approved(row) => {
                info!(
                    %request_id,
                    employee_id = %row.employee_id,
                    payment_date = ?row.payment_date,
                    "payroll: salary payment approved"
                );
                self.events.payment_approved(row.clone()).await;
                Ok(row)
            }
            ApprovalOutcome::AlreadyPaid => {
                warn!(%request_id, "payroll: payment request already paid");
                self.events
                    .approval_conflict(request_id, "request is already paid".to_string())
                    .await;
                Err(PaymentError::AlreadyPaid)
            }
            ApprovalOutcome::InvalidState(status) => {
                warn!(
                    %request_id,
                    status = %status,
                    "payroll: payment request is not awaiting approval"
                );
                self.events
                    .approval_conflict(
                        request_id,
                        format!("request is not awaiting approval (status: {status})"),
                    )
                    .await;
                Err(PaymentError::InvalidApprovalState(status))
            }
            ApprovalOutcome::NotFound => {
                warn!(%request_id, "payroll: payment request not found");
                Err(PaymentError::RequestNotFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::usecases::payments::MockPaymentEventsObserver;
    use crate::domain::repositories::payment_requests::MockPaymentRequestRepository;
    use crate::domain::value_objects::enums::payment_request_statuses::PaymentRequestStatus;

    fn approved_row(request_id: Uuid) -> PaymentRequestEntity {
        PaymentRequestEntity {
            id: request_id,
            employee_id: Uuid::new_v4(),
            employee_name: "Jane Doe".to_string(),
            employee_email: "jane@craftflow.dev".to_string(),
            amount_minor: 5_000_000,
            month: 7,
            year: 2025,
            gateway_payment_method_id: "pm_1".to_string(),
            gateway_transaction_id: "tx_1".to_string(),
            status: PaymentRequestStatus::ApprovedPaid.to_string(),
            requested_at: Utc::now(),
            payment_date: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn approval_stamps_the_payment_date() {
        let request_id = Uuid::new_v4();

        let mut payment_repo = MockPaymentRequestRepository::new();
        payment_repo
            .expect_approve_and_pay()
            .times(1)
            .returning(|id, _| Ok(ApprovalOutcome::Approved(approved_row(id))));

        let mut events = MockPaymentEventsObserver::new();
        events.expect_payment_approved().times(1).returning(|_| ());

        let usecase = PayrollApprovalUseCase::new(Arc::new(payment_repo), Arc::new(events));
        let row = usecase
            .approve_and_pay(request_id)
            .await
            .expect("approval succeeds");

        assert_eq!(row.status(), PaymentRequestStatus::ApprovedPaid);
        assert!(row.payment_date.is_some());
    }

    #[tokio::test]
    async fn second_approval_is_already_paid() {
        let mut payment_repo = MockPaymentRequestRepository::new();
        payment_repo
            .expect_approve_and_pay()
            .times(1)
            .returning(|_, _| Ok(ApprovalOutcome::AlreadyPaid));

        let mut events = MockPaymentEventsObserver::new();
        events
            .expect_approval_conflict()
            .times(1)
            .returning(|_, _| ());

        let usecase = PayrollApprovalUseCase::new(Arc::new(payment_repo), Arc::new(events));

        let result = usecase.approve_and_pay(Uuid::new_v4()).await;
        assert!(matches!(result, Err(PaymentError::AlreadyPaid)));
    }

    #[tokio::test]
    async fn approving_a_non_recorded_request_is_rejected() {
        let mut payment_repo = MockPaymentRequestRepository::new();
        payment_repo
            .expect_approve_and_pay()
            .times(1)
            .returning(|_, _| {
                Ok(ApprovalOutcome::InvalidState(PaymentRequestStatus::Failed))
            });

        let mut events = MockPaymentEventsObserver::new();
        events
            .expect_approval_conflict()
            .times(1)
            .returning(|_, _| ());

        let usecase = PayrollApprovalUseCase::new(Arc::new(payment_repo), Arc::new(events));

        let result = usecase.approve_and_pay(Uuid::new_v4()).await;
        assert!(matches!(
            result,
            Err(PaymentError::InvalidApprovalState(PaymentRequestStatus::Failed))
        ));
    }

    #[tokio::test]
    async fn missing_request_is_not_found() {
        let mut payment_repo = MockPaymentRequestRepository::new();
        payment_repo
            .expect_approve_and_pay()
            .returning(|_, _| Ok(ApprovalOutcome::NotFound));

        let usecase = PayrollApprovalUseCase::new(
            Arc::new(payment_repo),
            Arc::new(MockPaymentEventsObserver::new()),
        );

        let result = usecase.approve_and_pay(Uuid::new_v4()).await;
        assert!(matches!(result, Err(PaymentError::RequestNotFound)));
    }
}
