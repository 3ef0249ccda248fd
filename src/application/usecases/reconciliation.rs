use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::usecases::payments::{
    PaymentError, PaymentEventsObserver, PaymentGateway, UseCaseResult,
};
use crate::domain::{
    entities::payment_requests::NewPaymentRequestEntity,
    repositories::payment_requests::PaymentRequestRepository,
    value_objects::{
        enums::payment_request_statuses::PaymentRequestStatus, pay_periods::PayPeriod,
        payments::RecordPaymentOutcome,
    },
};
use crate::payments::stripe_client::GatewayCharge;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub scanned: usize,
    pub already_recorded: usize,
    pub recovered: usize,
    pub flagged: usize,
}

/// Detects and repairs orphaned charges: gateway-confirmed payments whose
/// ledger write never completed. Recovery is a plain retry of the idempotent
/// insert with the known transaction id; charges that cannot be attributed
/// from their intent metadata are flagged for manual review instead.
pub struct ReconciliationUseCase<P, G, N>
where
    P: PaymentRequestRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: PaymentEventsObserver + Send + Sync + 'static,
{
    payment_repo: Arc<P>,
    gateway: Arc<G>,
    events: Arc<N>,
    lookback_hours: i64,
}

impl<P, G, N> ReconciliationUseCase<P, G, N>
where
    P: PaymentRequestRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: PaymentEventsObserver + Send + Sync + 'static,
{
    pub fn new(
        payment_repo: Arc<P>,
        gateway: Arc<G>,
        events: Arc<N>,
        lookback_hours: i64,
    ) -> Self {
        Self {
            payment_repo,
            gateway,
            events,
            lookback_hours,
        }
    }

    pub async fn run_once(&self) -> UseCaseResult<ReconciliationReport> {
        let since = Utc::now() - Duration::hours(self.lookback_hours);
        info!(
            lookback_hours = self.lookback_hours,
            "reconciliation: scanning gateway charges"
        );

        let charges = self
            .gateway
            .list_succeeded_charges_since(since)
            .await
            .map_err(PaymentError::from)?;

        let mut report = ReconciliationReport {
            scanned: charges.len(),
            ..ReconciliationReport::default()
        };

        for charge in charges {
            let existing = self
                .payment_repo
                .find_by_transaction_id(&charge.transaction_id)
                .await
                .map_err(PaymentError::Internal)?;

            if existing.is_some() {
                report.already_recorded += 1;
                continue;
            }

            warn!(
                transaction_id = %charge.transaction_id,
                amount_minor = charge.amount_minor,
                "reconciliation: charge has no ledger row"
            );

            let Some(new_request) = rebuild_request(&charge) else {
                error!(
                    transaction_id = %charge.transaction_id,
                    "reconciliation: cannot attribute charge from metadata, flagging for review"
                );
                self.events
                    .orphaned_charge_flagged(
                        charge.transaction_id.clone(),
                        "intent metadata does not identify an employee and period".to_string(),
                    )
                    .await;
                report.flagged += 1;
                continue;
            };

            match self.payment_repo.record_payment(new_request).await {
                Ok(RecordPaymentOutcome::Inserted(row)) => {
                    warn!(
                        request_id = %row.id,
                        transaction_id = %row.gateway_transaction_id,
                        employee_id = %row.employee_id,
                        "reconciliation: orphaned charge recovered into the ledger"
                    );
                    self.events
                        .orphaned_charge_recovered(row.gateway_transaction_id.clone())
                        .await;
                    report.recovered += 1;
                }
                Ok(RecordPaymentOutcome::AlreadyRecorded(_)) => {
                    // Lost the race against an in-flight persistence retry.
                    report.already_recorded += 1;
                }
                Ok(RecordPaymentOutcome::DuplicateActivePeriod) => {
                    error!(
                        transaction_id = %charge.transaction_id,
                        "reconciliation: recovery blocked by an active request for the period"
                    );
                    self.events
                        .orphaned_charge_flagged(
                            charge.transaction_id.clone(),
                            "recovery blocked by an active request for the period".to_string(),
                        )
                        .await;
                    report.flagged += 1;
                }
                Err(db_error) => {
                    error!(
                        transaction_id = %charge.transaction_id,
                        db_error = ?db_error,
                        "reconciliation: recovery insert failed, will retry next pass"
                    );
                    report.flagged += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            already_recorded = report.already_recorded,
            recovered = report.recovered,
            flagged = report.flagged,
            "reconciliation: pass finished"
        );
        Ok(report)
    }
}

/// Rebuilds a ledger row from the metadata the orchestrator attached to the
/// payment intent. Charges created outside that flow lack the metadata and
/// are left to manual review.
fn rebuild_request(charge: &GatewayCharge) -> Option<NewPaymentRequestEntity> {
    let employee_id = charge
        .metadata
        .get("employee_id")
        .and_then(|value| Uuid::parse_str(value).ok())?;
    let employee_name = charge.metadata.get("employee_name")?.clone();
    let employee_email = charge.metadata.get("employee_email")?.clone();
    let payment_method_id = charge.metadata.get("payment_method_id")?.clone();
    let month = charge
        .metadata
        .get("month")
        .and_then(|value| value.parse::<i32>().ok())?;
    let year = charge
        .metadata
        .get("year")
        .and_then(|value| value.parse::<i32>().ok())?;
    let period = PayPeriod::new(month, year)?;

    let requested_at = ts_to_datetime(charge.created).unwrap_or_else(Utc::now);

    Some(NewPaymentRequestEntity {
        employee_id,
        employee_name,
        employee_email,
        amount_minor: charge.amount_minor,
        month: period.month(),
        year: period.year(),
        gateway_payment_method_id: payment_method_id,
        gateway_transaction_id: charge.transaction_id.clone(),
        status: PaymentRequestStatus::Recorded.to_string(),
        requested_at,
    })
}

fn ts_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}

/// Background loop around the reconciliation pass. Errors are logged and the
/// next tick still runs.
pub async fn run_reconciliation_loop<P, G, N>(
    usecase: Arc<ReconciliationUseCase<P, G, N>>,
    interval: StdDuration,
) where
    P: PaymentRequestRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: PaymentEventsObserver + Send + Sync + 'static,
{
    loop {
        if let Err(error) = usecase.run_once().await {
            error!("Error while reconciling gateway charges: {}", error);
        }

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::usecases::payments::{
        MockPaymentEventsObserver, MockPaymentGateway,
    };
    use crate::domain::entities::payment_requests::PaymentRequestEntity;
    use crate::domain::repositories::payment_requests::MockPaymentRequestRepository;
    use std::collections::HashMap;

    fn charge_with_metadata(transaction_id: &str, employee_id: Uuid) -> GatewayCharge {
        GatewayCharge {
            transaction_id: transaction_id.to_string(),
            amount_minor: 5_000_000,
            created: 1_752_000_000,
            metadata: HashMap::from([
                ("employee_id".to_string(), employee_id.to_string()),
                ("employee_name".to_string(), "Jane Doe".to_string()),
                (
                    "employee_email".to_string(),
                    "jane@craftflow.dev".to_string(),
                ),
                ("payment_method_id".to_string(), "pm_1".to_string()),
                ("month".to_string(), "7".to_string()),
                ("year".to_string(), "2025".to_string()),
            ]),
        }
    }

    fn bare_charge(transaction_id: &str) -> GatewayCharge {
        GatewayCharge {
            transaction_id: transaction_id.to_string(),
            amount_minor: 5_000_000,
            created: 1_752_000_000,
            metadata: HashMap::new(),
        }
    }

    fn row_from(new: &NewPaymentRequestEntity) -> PaymentRequestEntity {
        PaymentRequestEntity {
            id: Uuid::new_v4(),
            employee_id: new.employee_id,
            employee_name: new.employee_name.clone(),
            employee_email: new.employee_email.clone(),
            amount_minor: new.amount_minor,
            month: new.month,
            year: new.year,
            gateway_payment_method_id: new.gateway_payment_method_id.clone(),
            gateway_transaction_id: new.gateway_transaction_id.clone(),
            status: new.status.clone(),
            requested_at: new.requested_at,
            payment_date: None,
        }
    }

    #[tokio::test]
    async fn recovers_an_orphaned_charge_with_metadata() {
        let employee_id = Uuid::new_v4();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_list_succeeded_charges_since()
            .returning(move |_| Ok(vec![charge_with_metadata("tx_orphan", employee_id)]));

        let mut payment_repo = MockPaymentRequestRepository::new();
        payment_repo
            .expect_find_by_transaction_id()
            .returning(|_| Ok(None));
        payment_repo
            .expect_record_payment()
            .withf(move |new| {
                new.gateway_transaction_id == "tx_orphan"
                    && new.employee_id == employee_id
                    && new.month == 7
                    && new.year == 2025
                    && new.status == "recorded"
            })
            .times(1)
            .returning(|new| Ok(RecordPaymentOutcome::Inserted(row_from(&new))));

        let mut events = MockPaymentEventsObserver::new();
        events
            .expect_orphaned_charge_recovered()
            .times(1)
            .returning(|_| ());

        let usecase = ReconciliationUseCase::new(
            Arc::new(payment_repo),
            Arc::new(gateway),
            Arc::new(events),
            24,
        );

        let report = usecase.run_once().await.expect("pass succeeds");
        assert_eq!(report.scanned, 1);
        assert_eq!(report.recovered, 1);
        assert_eq!(report.flagged, 0);
    }

    #[tokio::test]
    async fn flags_a_charge_without_metadata() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_list_succeeded_charges_since()
            .returning(|_| Ok(vec![bare_charge("tx_foreign")]));

        let mut payment_repo = MockPaymentRequestRepository::new();
        payment_repo
            .expect_find_by_transaction_id()
            .returning(|_| Ok(None));
        // record_payment intentionally not expected.

        let mut events = MockPaymentEventsObserver::new();
        events
            .expect_orphaned_charge_flagged()
            .times(1)
            .returning(|_, _| ());

        let usecase = ReconciliationUseCase::new(
            Arc::new(payment_repo),
            Arc::new(gateway),
            Arc::new(events),
            24,
        );

        let report = usecase.run_once().await.expect("pass succeeds");
        assert_eq!(report.flagged, 1);
        assert_eq!(report.recovered, 0);
    }

    #[tokio::test]
    async fn leaves_recorded_charges_alone() {
        let employee_id = Uuid::new_v4();
        let charge = charge_with_metadata("tx_known", employee_id);
        let known_row = row_from(&rebuild_request(&charge).expect("metadata is complete"));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_list_succeeded_charges_since()
            .returning(move |_| Ok(vec![charge_with_metadata("tx_known", employee_id)]));

        let mut payment_repo = MockPaymentRequestRepository::new();
        payment_repo
            .expect_find_by_transaction_id()
            .returning(move |_| Ok(Some(known_row.clone())));

        let usecase = ReconciliationUseCase::new(
            Arc::new(payment_repo),
            Arc::new(gateway),
            Arc::new(MockPaymentEventsObserver::new()),
            24,
        );

        let report = usecase.run_once().await.expect("pass succeeds");
        assert_eq!(report.already_recorded, 1);
        assert_eq!(report.recovered, 0);
        assert_eq!(report.flagged, 0);
    }
}
