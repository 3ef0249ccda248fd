use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    entities::payment_requests::{NewPaymentRequestEntity, PaymentRequestEntity},
    repositories::{
        employees::EmployeeRepository, payment_requests::PaymentRequestRepository,
    },
    value_objects::{
        enums::payment_request_statuses::PaymentRequestStatus,
        pay_periods::PayPeriod,
        payments::{
            BillingContext, CardDetails, InitiatePaymentModel, PaymentHistoryDto,
            PaymentRequestDto, RecordPaymentModel, RecordPaymentOutcome,
        },
    },
};
use crate::payments::stripe_client::{
    ChargeResult, ChargeStatus, GatewayCharge, GatewayError, PaymentIntent, StripeClient,
};

/// Port over the external payment gateway. The four operations map onto the
/// strict orchestration order: tokenize, create intent, confirm, and (for the
/// reconciliation pass) list confirmed charges.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn tokenize_card(
        &self,
        card: &CardDetails,
        billing: &BillingContext,
    ) -> Result<String, GatewayError>;

    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        metadata: &HashMap<String, String>,
    ) -> Result<PaymentIntent, GatewayError>;

    async fn confirm_charge(
        &self,
        confirmation_secret: &str,
        payment_method_id: &str,
        billing: &BillingContext,
    ) -> Result<ChargeResult, GatewayError>;

    async fn list_succeeded_charges_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<GatewayCharge>, GatewayError>;
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn tokenize_card(
        &self,
        card: &CardDetails,
        billing: &BillingContext,
    ) -> Result<String, GatewayError> {
        self.create_payment_method(card, billing).await
    }

    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        metadata: &HashMap<String, String>,
    ) -> Result<PaymentIntent, GatewayError> {
        StripeClient::create_payment_intent(self, amount_minor, metadata).await
    }

    async fn confirm_charge(
        &self,
        confirmation_secret: &str,
        payment_method_id: &str,
        billing: &BillingContext,
    ) -> Result<ChargeResult, GatewayError> {
        self.confirm_payment_intent(confirmation_secret, payment_method_id, billing)
            .await
    }

    async fn list_succeeded_charges_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<GatewayCharge>, GatewayError> {
        StripeClient::list_succeeded_charges_since(self, since).await
    }
}

/// Observer hooks fired by the ledger and approval operations. Consumers
/// (operator alerting, cache invalidation for the dashboard views) subscribe
/// here instead of reaching into shared state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentEventsObserver: Send + Sync {
    async fn payment_recorded(&self, request: PaymentRequestEntity);
    async fn payment_approved(&self, request: PaymentRequestEntity);
    async fn charge_declined(&self, employee_id: Uuid, period: PayPeriod, reason: String);
    async fn approval_conflict(&self, request_id: Uuid, detail: String);
    async fn orphaned_charge_recovered(&self, transaction_id: String);
    async fn orphaned_charge_flagged(&self, transaction_id: String, detail: String);
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("employee not found")]
    EmployeeNotFound,
    #[error("employee is not eligible for salary payment")]
    NotEligible,
    #[error("invalid pay period: month must be 1-12 and year a 4-digit number")]
    InvalidPeriod,
    #[error("amount must be a positive number of minor currency units")]
    InvalidAmount,
    #[error("card rejected: {0}")]
    CardRejected(String),
    #[error("charge declined: {0}")]
    ChargeDeclined(String),
    #[error("payment gateway is unavailable, please retry")]
    GatewayUnavailable,
    #[error("employee already has a pending request for this period")]
    DuplicateActiveRequest,
    #[error("a payment for this employee and period is already in progress")]
    RequestInFlight,
    #[error("payment request is already paid")]
    AlreadyPaid,
    #[error("payment request is not awaiting approval (status: {0})")]
    InvalidApprovalState(PaymentRequestStatus),
    #[error("payment request not found")]
    RequestNotFound,
    #[error("forbidden")]
    Forbidden,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            PaymentError::EmployeeNotFound | PaymentError::RequestNotFound => {
                StatusCode::NOT_FOUND
            }
            PaymentError::NotEligible => StatusCode::UNPROCESSABLE_ENTITY,
            PaymentError::InvalidPeriod
            | PaymentError::InvalidAmount
            | PaymentError::CardRejected(_) => StatusCode::BAD_REQUEST,
            PaymentError::ChargeDeclined(_) => StatusCode::PAYMENT_REQUIRED,
            PaymentError::GatewayUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            PaymentError::DuplicateActiveRequest
            | PaymentError::RequestInFlight
            | PaymentError::AlreadyPaid
            | PaymentError::InvalidApprovalState(_) => StatusCode::CONFLICT,
            PaymentError::Forbidden => StatusCode::FORBIDDEN,
            PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::CardRejected { message, .. } => PaymentError::CardRejected(message),
            GatewayError::Unavailable { .. } => PaymentError::GatewayUnavailable,
            GatewayError::InvalidAmount(_) => PaymentError::InvalidAmount,
            GatewayError::Protocol(detail) => PaymentError::Internal(anyhow!(detail)),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, PaymentError>;

type InFlightSet = Mutex<HashSet<(Uuid, PayPeriod)>>;

/// Removes its key from the in-flight set when the orchestration leg ends,
/// on success and on every error path alike.
struct InFlightGuard {
    key: (Uuid, PayPeriod),
    set: Arc<InFlightSet>,
}

impl InFlightGuard {
    fn acquire(set: Arc<InFlightSet>, key: (Uuid, PayPeriod)) -> Option<Self> {
        let inserted = {
            let mut entries = set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            entries.insert(key)
        };
        inserted.then_some(Self { key, set })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut entries = self
            .set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.remove(&self.key);
    }
}

pub struct SalaryPaymentUseCase<E, P, G, N>
where
    E: EmployeeRepository + Send + Sync + 'static,
    P: PaymentRequestRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: PaymentEventsObserver + Send + Sync + 'static,
{
    employee_repo: Arc<E>,
    payment_repo: Arc<P>,
    gateway: Arc<G>,
    events: Arc<N>,
    in_flight: Arc<InFlightSet>,
}

impl<E, P, G, N> SalaryPaymentUseCase<E, P, G, N>
where
    E: EmployeeRepository + Send + Sync + 'static,
    P: PaymentRequestRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: PaymentEventsObserver + Send + Sync + 'static,
{
    pub fn new(
        employee_repo: Arc<E>,
        payment_repo: Arc<P>,
        gateway: Arc<G>,
        events: Arc<N>,
    ) -> Self {
        Self {
            employee_repo,
            payment_repo,
            gateway,
            events,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Obtains a single-use confirmation secret for the given amount. The
    /// gateway's secret key stays on this side; the caller only ever sees
    /// the secret.
    pub async fn create_intent(&self, amount_minor: i64) -> UseCaseResult<String> {
        if amount_minor <= 0 {
            warn!(amount_minor, "payments: rejected intent for non-positive amount");
            return Err(PaymentError::InvalidAmount);
        }

        info!(amount_minor, "payments: creating payment intent");
        let intent = self
            .gateway
            .create_payment_intent(amount_minor, &HashMap::new())
            .await?;

        Ok(intent.confirmation_secret)
    }

    /// The full orchestration: eligibility gate, duplicate-period guard,
    /// tokenize, intent, confirm, record. The four gateway/ledger steps run
    /// strictly in sequence; reordering would leave the idempotency key
    /// nonexistent at record time.
    pub async fn initiate_payment(
        &self,
        model: InitiatePaymentModel,
    ) -> UseCaseResult<PaymentRequestEntity> {
        let period =
            PayPeriod::new(model.month, model.year).ok_or(PaymentError::InvalidPeriod)?;

        info!(
            employee_id = %model.employee_id,
            %period,
            "payments: salary payment initiated"
        );

        // Eligibility is evaluated on a freshly loaded row, never cached:
        // verification and fired state change concurrently via the HR flows.
        let employee = self
            .employee_repo
            .find_by_id(model.employee_id)
            .await
            .map_err(PaymentError::Internal)?
            .ok_or_else(|| {
                warn!(employee_id = %model.employee_id, "payments: employee not found");
                PaymentError::EmployeeNotFound
            })?;

        if !employee.can_initiate_payment() {
            warn!(
                employee_id = %employee.id,
                is_verified = employee.is_verified,
                status = %employee.status,
                salary = employee.salary,
                "payments: employee is not eligible"
            );
            return Err(PaymentError::NotEligible);
        }

        if self
            .payment_repo
            .has_active_request(employee.id, period)
            .await
            .map_err(PaymentError::Internal)?
        {
            warn!(
                employee_id = %employee.id,
                %period,
                "payments: active request already exists for period"
            );
            return Err(PaymentError::DuplicateActiveRequest);
        }

        // Server-side debounce of double submission. A hint only: the ledger
        // invariants below remain the authoritative guard.
        let guard = InFlightGuard::acquire(Arc::clone(&self.in_flight), (employee.id, period))
            .ok_or_else(|| {
                warn!(
                    employee_id = %employee.id,
                    %period,
                    "payments: initiation already in flight"
                );
                PaymentError::RequestInFlight
            })?;

        let billing = BillingContext {
            name: employee.name.clone(),
            email: employee.email.clone(),
        };

        // Tokenization has no ledger side effects; a rejected card ends the
        // flow before any money can move.
        let payment_method_id = self.gateway.tokenize_card(&model.card, &billing).await?;

        // Snapshot of the salary at request time. Later salary updates do
        // not touch this request.
        // The metadata is what lets the reconciliation pass rebuild a ledger
        // row for this charge if the record step below never completes.
        let amount_minor = employee.salary_minor();
        let metadata = HashMap::from([
            ("employee_id".to_string(), employee.id.to_string()),
            ("employee_name".to_string(), employee.name.clone()),
            ("employee_email".to_string(), employee.email.clone()),
            ("payment_method_id".to_string(), payment_method_id.clone()),
            ("month".to_string(), period.month().to_string()),
            ("year".to_string(), period.year().to_string()),
        ]);

        let gateway = Arc::clone(&self.gateway);
        let payment_repo = Arc::clone(&self.payment_repo);
        let events = Arc::clone(&self.events);

        // The intent/confirm/record leg runs on its own task: a client that
        // cancels mid-flight drops this handler future, but must not be able
        // to abort the sequence between the charge and its persistence.
        let leg = tokio::spawn(async move {
            let _guard = guard;

            let intent = gateway
                .create_payment_intent(amount_minor, &metadata)
                .await?;

            let charge = gateway
                .confirm_charge(&intent.confirmation_secret, &payment_method_id, &billing)
                .await?;

            match charge.status {
                ChargeStatus::Failed => {
                    let reason = charge
                        .failure_message
                        .unwrap_or_else(|| "charge declined".to_string());
                    warn!(
                        employee_id = %employee.id,
                        %period,
                        transaction_id = %charge.gateway_transaction_id,
                        reason = %reason,
                        "payments: gateway declined the charge"
                    );
                    events
                        .charge_declined(employee.id, period, reason.clone())
                        .await;
                    Err(PaymentError::ChargeDeclined(reason))
                }
                ChargeStatus::Succeeded => {
                    let new_request = NewPaymentRequestEntity {
                        employee_id: employee.id,
                        employee_name: employee.name.clone(),
                        employee_email: employee.email.clone(),
                        amount_minor,
                        month: period.month(),
                        year: period.year(),
                        gateway_payment_method_id: payment_method_id.clone(),
                        gateway_transaction_id: charge.gateway_transaction_id.clone(),
                        status: PaymentRequestStatus::Recorded.to_string(),
                        requested_at: Utc::now(),
                    };

                    let outcome = match payment_repo.record_payment(new_request).await {
                        Ok(outcome) => outcome,
                        Err(db_error) => {
                            // Money moved, ledger write failed: an orphaned
                            // charge. The reconciliation pass recovers it by
                            // transaction id; flag it immediately as well.
                            error!(
                                employee_id = %employee.id,
                                %period,
                                transaction_id = %charge.gateway_transaction_id,
                                db_error = ?db_error,
                                "payments: ledger write failed after a confirmed charge"
                            );
                            events
                                .orphaned_charge_flagged(
                                    charge.gateway_transaction_id.clone(),
                                    "ledger write failed after confirmed charge".to_string(),
                                )
                                .await;
                            return Err(PaymentError::Internal(db_error));
                        }
                    };

                    match outcome {
                        RecordPaymentOutcome::Inserted(row) => {
                            info!(
                                request_id = %row.id,
                                employee_id = %row.employee_id,
                                transaction_id = %row.gateway_transaction_id,
                                "payments: payment request recorded"
                            );
                            events.payment_recorded(row.clone()).await;
                            Ok(row)
                        }
                        RecordPaymentOutcome::AlreadyRecorded(row) => {
                            info!(
                                request_id = %row.id,
                                transaction_id = %row.gateway_transaction_id,
                                "payments: transaction already recorded, returning existing row"
                            );
                            Ok(row)
                        }
                        RecordPaymentOutcome::DuplicateActivePeriod => {
                            error!(
                                employee_id = %employee.id,
                                %period,
                                transaction_id = %charge.gateway_transaction_id,
                                "payments: confirmed charge blocked by a concurrent request for the period"
                            );
                            events
                                .orphaned_charge_flagged(
                                    charge.gateway_transaction_id.clone(),
                                    "duplicate active period blocked persistence".to_string(),
                                )
                                .await;
                            Err(PaymentError::DuplicateActiveRequest)
                        }
                    }
                }
            }
        });

        leg.await
            .map_err(|join_error| PaymentError::Internal(anyhow!(join_error)))?
    }

    /// Ledger persistence for a charge the caller already confirmed at the
    /// gateway. Returns the row plus whether this call created it; a replay
    /// with a known transaction id is answered with the original row.
    pub async fn record_confirmed_payment(
        &self,
        model: RecordPaymentModel,
    ) -> UseCaseResult<(PaymentRequestEntity, bool)> {
        let period =
            PayPeriod::new(model.month, model.year).ok_or(PaymentError::InvalidPeriod)?;
        if model.amount <= 0 {
            return Err(PaymentError::InvalidAmount);
        }

        info!(
            employee_id = %model.employee_id,
            %period,
            transaction_id = %model.gateway_transaction_id,
            "payments: recording confirmed payment"
        );

        match self
            .payment_repo
            .record_payment(model.to_entity(period))
            .await
            .map_err(PaymentError::Internal)?
        {
            RecordPaymentOutcome::Inserted(row) => {
                self.events.payment_recorded(row.clone()).await;
                Ok((row, true))
            }
            RecordPaymentOutcome::AlreadyRecorded(row) => {
                info!(
                    transaction_id = %row.gateway_transaction_id,
                    "payments: idempotent replay of recorded transaction"
                );
                Ok((row, false))
            }
            RecordPaymentOutcome::DuplicateActivePeriod => {
                warn!(
                    employee_id = %model.employee_id,
                    %period,
                    "payments: active request already exists for period"
                );
                Err(PaymentError::DuplicateActiveRequest)
            }
        }
    }

    pub async fn list_history(
        &self,
        email: &str,
        page: i64,
        limit: i64,
    ) -> UseCaseResult<PaymentHistoryDto> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);

        let (rows, total) = self
            .payment_repo
            .list_by_email(email, page, limit)
            .await
            .map_err(PaymentError::Internal)?;

        Ok(PaymentHistoryDto {
            payments: rows.into_iter().map(PaymentRequestDto::from).collect(),
            total,
        })
    }

    pub async fn list_all(&self) -> UseCaseResult<Vec<PaymentRequestDto>> {
        let rows = self
            .payment_repo
            .list_all()
            .await
            .map_err(PaymentError::Internal)?;

        Ok(rows.into_iter().map(PaymentRequestDto::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::employees::EmployeeEntity;
    use crate::domain::repositories::employees::MockEmployeeRepository;
    use crate::domain::repositories::payment_requests::MockPaymentRequestRepository;

    fn employee() -> EmployeeEntity {
        EmployeeEntity {
            id: Uuid::new_v4(),
            name: "Jane Doe".to_string(),
            email: "jane@craftflow.dev".to_string(),
            role: "Employee".to_string(),
            is_verified: true,
            status: "active".to_string(),
            salary: 50_000,
            created_at: Utc::now(),
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

    fn card() -> CardDetails {
        CardDetails {
            number: "4242424242424242".to_string(),
            exp_month: 12,
            exp_year: 2030,
            cvc: "123".to_string(),
        }
    }

    fn usecase(
        employee_repo: MockEmployeeRepository,
        payment_repo: MockPaymentRequestRepository,
        gateway: MockPaymentGateway,
        events: MockPaymentEventsObserver,
    ) -> SalaryPaymentUseCase<
        MockEmployeeRepository,
        MockPaymentRequestRepository,
        MockPaymentGateway,
        MockPaymentEventsObserver,
    > {
        SalaryPaymentUseCase::new(
            Arc::new(employee_repo),
            Arc::new(payment_repo),
            Arc::new(gateway),
            Arc::new(events),
        )
    }

    #[tokio::test]
    async fn happy_path_records_the_confirmed_charge() {
        let emp = employee();
        let emp_id = emp.id;

        let mut employee_repo = MockEmployeeRepository::new();
        employee_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(emp.clone())));

        let mut payment_repo = MockPaymentRequestRepository::new();
        payment_repo
            .expect_has_active_request()
            .returning(|_, _| Ok(false));
        payment_repo
            .expect_record_payment()
            .withf(|new| {
                new.gateway_transaction_id == "tx_1"
                    && new.amount_minor == 5_000_000
                    && new.status == "recorded"
            })
            .times(1)
            .returning(|new| Ok(RecordPaymentOutcome::Inserted(row_from(&new))));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_tokenize_card()
            .times(1)
            .returning(|_, _| Ok("pm_1".to_string()));
        gateway
            .expect_create_payment_intent()
            .withf(|amount, _| *amount == 5_000_000)
            .times(1)
            .returning(|_, _| {
                Ok(PaymentIntent {
                    intent_id: "pi_1".to_string(),
                    confirmation_secret: "pi_1_secret_abc".to_string(),
                })
            });
        gateway
            .expect_confirm_charge()
            .times(1)
            .returning(|_, _, _| {
                Ok(ChargeResult {
                    status: ChargeStatus::Succeeded,
                    gateway_transaction_id: "tx_1".to_string(),
                    failure_message: None,
                })
            });

        let mut events = MockPaymentEventsObserver::new();
        events
            .expect_payment_recorded()
            .times(1)
            .returning(|_| ());

        let usecase = usecase(employee_repo, payment_repo, gateway, events);
        let model = InitiatePaymentModel {
            employee_id: emp_id,
            month: 7,
            year: 2025,
            card: card(),
        };

        let row = usecase.initiate_payment(model).await.expect("payment succeeds");
        assert_eq!(row.gateway_transaction_id, "tx_1");
        assert_eq!(row.amount_minor, 5_000_000);
        assert_eq!(row.status(), PaymentRequestStatus::Recorded);
        assert!(row.payment_date.is_none());
    }

    #[tokio::test]
    async fn unverified_employee_never_reaches_the_gateway() {
        let mut emp = employee();
        emp.is_verified = false;
        let emp_id = emp.id;

        let mut employee_repo = MockEmployeeRepository::new();
        employee_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(emp.clone())));

        // No gateway or ledger expectations: any call would fail the test.
        let usecase = usecase(
            employee_repo,
            MockPaymentRequestRepository::new(),
            MockPaymentGateway::new(),
            MockPaymentEventsObserver::new(),
        );

        let result = usecase
            .initiate_payment(InitiatePaymentModel {
                employee_id: emp_id,
                month: 7,
                year: 2025,
                card: card(),
            })
            .await;

        assert!(matches!(result, Err(PaymentError::NotEligible)));
    }

    #[tokio::test]
    async fn active_request_for_the_period_blocks_initiation() {
        let emp = employee();
        let emp_id = emp.id;

        let mut employee_repo = MockEmployeeRepository::new();
        employee_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(emp.clone())));

        let mut payment_repo = MockPaymentRequestRepository::new();
        payment_repo
            .expect_has_active_request()
            .returning(|_, _| Ok(true));

        let usecase = usecase(
            employee_repo,
            payment_repo,
            MockPaymentGateway::new(),
            MockPaymentEventsObserver::new(),
        );

        let result = usecase
            .initiate_payment(InitiatePaymentModel {
                employee_id: emp_id,
                month: 7,
                year: 2025,
                card: card(),
            })
            .await;

        assert!(matches!(result, Err(PaymentError::DuplicateActiveRequest)));
    }

    #[tokio::test]
    async fn declined_charge_creates_no_ledger_row() {
        let emp = employee();
        let emp_id = emp.id;

        let mut employee_repo = MockEmployeeRepository::new();
        employee_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(emp.clone())));

        let mut payment_repo = MockPaymentRequestRepository::new();
        payment_repo
            .expect_has_active_request()
            .returning(|_, _| Ok(false));
        // record_payment intentionally not expected.

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_tokenize_card()
            .returning(|_, _| Ok("pm_1".to_string()));
        gateway.expect_create_payment_intent().returning(|_, _| {
            Ok(PaymentIntent {
                intent_id: "pi_1".to_string(),
                confirmation_secret: "pi_1_secret_abc".to_string(),
            })
        });
        gateway.expect_confirm_charge().returning(|_, _, _| {
            Ok(ChargeResult {
                status: ChargeStatus::Failed,
                gateway_transaction_id: "pi_1".to_string(),
                failure_message: Some("insufficient funds".to_string()),
            })
        });

        let mut events = MockPaymentEventsObserver::new();
        events
            .expect_charge_declined()
            .times(1)
            .returning(|_, _, _| ());

        let usecase = usecase(employee_repo, payment_repo, gateway, events);
        let result = usecase
            .initiate_payment(InitiatePaymentModel {
                employee_id: emp_id,
                month: 7,
                year: 2025,
                card: card(),
            })
            .await;

        match result {
            Err(PaymentError::ChargeDeclined(reason)) => {
                assert_eq!(reason, "insufficient funds");
            }
            other => panic!("expected ChargeDeclined, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_card_surfaces_before_any_charge() {
        let emp = employee();
        let emp_id = emp.id;

        let mut employee_repo = MockEmployeeRepository::new();
        employee_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(emp.clone())));

        let mut payment_repo = MockPaymentRequestRepository::new();
        payment_repo
            .expect_has_active_request()
            .returning(|_, _| Ok(false));

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_tokenize_card().returning(|_, _| {
            Err(GatewayError::CardRejected {
                code: Some("invalid_number".to_string()),
                message: "Your card number is incorrect.".to_string(),
            })
        });
        // create_payment_intent and confirm_charge intentionally not expected.

        let usecase = usecase(
            employee_repo,
            payment_repo,
            gateway,
            MockPaymentEventsObserver::new(),
        );

        let result = usecase
            .initiate_payment(InitiatePaymentModel {
                employee_id: emp_id,
                month: 7,
                year: 2025,
                card: card(),
            })
            .await;

        assert!(matches!(result, Err(PaymentError::CardRejected(_))));
    }

    #[tokio::test]
    async fn record_replay_returns_the_existing_row() {
        let mut payment_repo = MockPaymentRequestRepository::new();
        payment_repo
            .expect_record_payment()
            .times(1)
            .returning(|new| Ok(RecordPaymentOutcome::AlreadyRecorded(row_from(&new))));

        let usecase = usecase(
            MockEmployeeRepository::new(),
            payment_repo,
            MockPaymentGateway::new(),
            MockPaymentEventsObserver::new(),
        );

        let model = RecordPaymentModel {
            employee_id: Uuid::new_v4(),
            name: "Jane Doe".to_string(),
            email: "jane@craftflow.dev".to_string(),
            amount: 5_000_000,
            month: 7,
            year: 2025,
            gateway_payment_method_id: "pm_1".to_string(),
            gateway_transaction_id: "tx_1".to_string(),
            requested_at: Utc::now(),
        };

        let (row, created) = usecase
            .record_confirmed_payment(model)
            .await
            .expect("replay succeeds");
        assert!(!created);
        assert_eq!(row.gateway_transaction_id, "tx_1");
    }

    #[tokio::test]
    async fn record_rejects_invalid_periods() {
        let usecase = usecase(
            MockEmployeeRepository::new(),
            MockPaymentRequestRepository::new(),
            MockPaymentGateway::new(),
            MockPaymentEventsObserver::new(),
        );

        let model = RecordPaymentModel {
            employee_id: Uuid::new_v4(),
            name: "Jane Doe".to_string(),
            email: "jane@craftflow.dev".to_string(),
            amount: 5_000_000,
            month: 13,
            year: 2025,
            gateway_payment_method_id: "pm_1".to_string(),
            gateway_transaction_id: "tx_1".to_string(),
            requested_at: Utc::now(),
        };

        let result = usecase.record_confirmed_payment(model).await;
        assert!(matches!(result, Err(PaymentError::InvalidPeriod)));
    }

    #[tokio::test]
    async fn create_intent_rejects_non_positive_amounts() {
        let usecase = usecase(
            MockEmployeeRepository::new(),
            MockPaymentRequestRepository::new(),
            MockPaymentGateway::new(),
            MockPaymentEventsObserver::new(),
        );

        assert!(matches!(
            usecase.create_intent(0).await,
            Err(PaymentError::InvalidAmount)
        ));
        assert!(matches!(
            usecase.create_intent(-500).await,
            Err(PaymentError::InvalidAmount)
        ));
    }
}
