pub mod employees;
pub mod payment_requests;
