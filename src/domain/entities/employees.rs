use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::value_objects::enums::employment_statuses::EmploymentStatus;
use crate::infrastructure::postgres::schema::employees;

/// Employee record. Owned by the HR management flows; the payment subsystem
/// only reads it, at the moment of initiation, to gate eligibility and
/// snapshot the salary.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = employees)]
pub struct EmployeeEntity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_verified: bool,
    pub status: String,
    pub salary: i64,
    pub created_at: DateTime<Utc>,
}

impl EmployeeEntity {
    /// Unknown status strings count as fired.
    pub fn employment_status(&self) -> EmploymentStatus {
        EmploymentStatus::from_str(&self.status).unwrap_or(EmploymentStatus::Fired)
    }

    /// Eligibility gate for the salary payment flow. Pure; callers must
    /// re-evaluate on a freshly loaded row since verification and fired
    /// state change concurrently through the HR flows.
    pub fn can_initiate_payment(&self) -> bool {
        self.is_verified
            && self.employment_status() == EmploymentStatus::Active
            && self.salary > 0
    }

    /// Salary in minor currency units, as charged through the gateway.
    pub fn salary_minor(&self) -> i64 {
        self.salary * 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn verified_active_employee_is_eligible() {
        assert!(employee().can_initiate_payment());
    }

    #[test]
    fn unverified_employee_is_not_eligible() {
        let mut emp = employee();
        emp.is_verified = false;
        assert!(!emp.can_initiate_payment());
    }

    #[test]
    fn fired_employee_is_not_eligible() {
        let mut emp = employee();
        emp.status = "fired".to_string();
        assert!(!emp.can_initiate_payment());
    }

    #[test]
    fn unknown_status_is_not_eligible() {
        let mut emp = employee();
        emp.status = "on_leave".to_string();
        assert!(!emp.can_initiate_payment());
    }

    #[test]
    fn non_positive_salary_is_not_eligible() {
        let mut emp = employee();
        emp.salary = 0;
        assert!(!emp.can_initiate_payment());
        emp.salary = -1;
        assert!(!emp.can_initiate_payment());
    }

    #[test]
    fn salary_snapshot_is_minor_units() {
        assert_eq!(employee().salary_minor(), 5_000_000);
    }
}
