use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::{
    application::usecases::payments::{
        PaymentError, PaymentEventsObserver, PaymentGateway, SalaryPaymentUseCase,
    },
    auth::AuthUser,
    domain::{
        repositories::{
            employees::EmployeeRepository, payment_requests::PaymentRequestRepository,
        },
        value_objects::payments::{
            CreateIntentModel, CreateIntentResponse, InitiatePaymentModel,
            InitiatePaymentResponse, PaymentHistoryQuery, RecordPaymentModel,
            RecordPaymentResponse,
        },
    },
    infrastructure::postgres::{
        postgres_connection::PgPoolSquad,
        repositories::{
            employees::EmployeePostgres, payment_requests::PaymentRequestPostgres,
        },
    },
    observability::events::AlertingPaymentEvents,
    payments::stripe_client::StripeClient,
};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe: Arc<StripeClient>,
    events: Arc<AlertingPaymentEvents>,
) -> Router {
    let employee_repository = EmployeePostgres::new(Arc::clone(&db_pool));
    let payment_request_repository = PaymentRequestPostgres::new(Arc::clone(&db_pool));
    let payments_usecase = SalaryPaymentUseCase::new(
        Arc::new(employee_repository),
        Arc::new(payment_request_repository),
        stripe,
        events,
    );

    Router::new()
        .route("/create-payment-intent", post(create_payment_intent))
        .route("/payment", post(record_payment))
        .route("/payments/initiate", post(initiate_payment))
        .route("/payments", get(payment_history))
        .route("/payments/all", get(all_payments))
        .with_state(Arc::new(payments_usecase))
}

pub async fn create_payment_intent<E, P, G, N>(
    State(payments_usecase): State<Arc<SalaryPaymentUseCase<E, P, G, N>>>,
    auth: AuthUser,
    Json(model): Json<CreateIntentModel>,
) -> Result<impl IntoResponse, PaymentError>
where
    E: EmployeeRepository + Send + Sync + 'static,
    P: PaymentRequestRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: PaymentEventsObserver + Send + Sync + 'static,
{
    if !auth.role.can_initiate_payments() {
        return Err(PaymentError::Forbidden);
    }

    let confirmation_secret = payments_usecase.create_intent(model.amount).await?;
    Ok(Json(CreateIntentResponse {
        confirmation_secret,
    }))
}

pub async fn record_payment<E, P, G, N>(
    State(payments_usecase): State<Arc<SalaryPaymentUseCase<E, P, G, N>>>,
    auth: AuthUser,
    Json(model): Json<RecordPaymentModel>,
) -> Result<impl IntoResponse, PaymentError>
where
    E: EmployeeRepository + Send + Sync + 'static,
    P: PaymentRequestRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: PaymentEventsObserver + Send + Sync + 'static,
{
    if !auth.role.can_initiate_payments() {
        return Err(PaymentError::Forbidden);
    }

    let (row, created) = payments_usecase.record_confirmed_payment(model).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(RecordPaymentResponse { inserted_id: row.id })))
}

pub async fn initiate_payment<E, P, G, N>(
    State(payments_usecase): State<Arc<SalaryPaymentUseCase<E, P, G, N>>>,
    auth: AuthUser,
    Json(model): Json<InitiatePaymentModel>,
) -> Result<impl IntoResponse, PaymentError>
where
    E: EmployeeRepository + Send + Sync + 'static,
    P: PaymentRequestRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: PaymentEventsObserver + Send + Sync + 'static,
{
    if !auth.role.can_initiate_payments() {
        return Err(PaymentError::Forbidden);
    }

    let row = payments_usecase.initiate_payment(model).await?;
    Ok((
        StatusCode::CREATED,
        Json(InitiatePaymentResponse {
            inserted_id: row.id,
            transaction_id: row.gateway_transaction_id,
        }),
    ))
}

pub async fn payment_history<E, P, G, N>(
    State(payments_usecase): State<Arc<SalaryPaymentUseCase<E, P, G, N>>>,
    auth: AuthUser,
    Query(query): Query<PaymentHistoryQuery>,
) -> Result<impl IntoResponse, PaymentError>
where
    E: EmployeeRepository + Send + Sync + 'static,
    P: PaymentRequestRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: PaymentEventsObserver + Send + Sync + 'static,
{
    if !auth.can_view_history_for(&query.email) {
        return Err(PaymentError::Forbidden);
    }

    let history = payments_usecase
        .list_history(
            &query.email,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(10),
        )
        .await?;

    Ok(Json(history))
}

pub async fn all_payments<E, P, G, N>(
    State(payments_usecase): State<Arc<SalaryPaymentUseCase<E, P, G, N>>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, PaymentError>
where
    E: EmployeeRepository + Send + Sync + 'static,
    P: PaymentRequestRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: PaymentEventsObserver + Send + Sync + 'static,
{
    if !auth.role.can_approve_payroll() {
        return Err(PaymentError::Forbidden);
    }

    let payments = payments_usecase.list_all().await?;
    Ok(Json(payments))
}
