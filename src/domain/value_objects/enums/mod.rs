pub mod employee_roles;
pub mod employment_statuses;
pub mod payment_request_statuses;
