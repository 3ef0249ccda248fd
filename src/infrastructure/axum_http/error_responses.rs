use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::application::usecases::payments::PaymentError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // Don't leak internal error detail to the client.
            PaymentError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}
