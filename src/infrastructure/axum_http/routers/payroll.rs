use std::sync::Arc;

use axum::{
    Json, Router, extract::State, response::IntoResponse, routing::patch,
};

use crate::{
    application::usecases::{
        payments::{PaymentError, PaymentEventsObserver},
        payroll::PayrollApprovalUseCase,
    },
    auth::AuthUser,
    domain::{
        repositories::payment_requests::PaymentRequestRepository,
        value_objects::payments::{ApprovePaymentModel, PaymentRequestDto},
    },
    infrastructure::postgres::{
        postgres_connection::PgPoolSquad, repositories::payment_requests::PaymentRequestPostgres,
    },
    observability::events::AlertingPaymentEvents,
};

pub fn routes(db_pool: Arc<PgPoolSquad>, events: Arc<AlertingPaymentEvents>) -> Router {
    let payment_request_repository = PaymentRequestPostgres::new(Arc::clone(&db_pool));
    let payroll_usecase =
        PayrollApprovalUseCase::new(Arc::new(payment_request_repository), events);

    Router::new()
        .route("/payments/salary", patch(approve_salary))
        .with_state(Arc::new(payroll_usecase))
}

pub async fn approve_salary<P, N>(
    State(payroll_usecase): State<Arc<PayrollApprovalUseCase<P, N>>>,
    auth: AuthUser,
    Json(model): Json<ApprovePaymentModel>,
) -> Result<impl IntoResponse, PaymentError>
where
    P: PaymentRequestRepository + Send + Sync + 'static,
    N: PaymentEventsObserver + Send + Sync + 'static,
{
    if !auth.role.can_approve_payroll() {
        return Err(PaymentError::Forbidden);
    }

    let row = payroll_usecase.approve_and_pay(model.id).await?;
    Ok(Json(PaymentRequestDto::from(row)))
}
