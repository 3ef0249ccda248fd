use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EmployeeRole {
    Employee,
    Hr,
    Admin,
}

impl EmployeeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeRole::Employee => "Employee",
            EmployeeRole::Hr => "HR",
            EmployeeRole::Admin => "Admin",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "Employee" => Some(EmployeeRole::Employee),
            "HR" => Some(EmployeeRole::Hr),
            "Admin" => Some(EmployeeRole::Admin),
            _ => None,
        }
    }

    /// HR runs the pay flow, Admin signs off on payroll.
    pub fn can_initiate_payments(&self) -> bool {
        matches!(self, EmployeeRole::Hr | EmployeeRole::Admin)
    }

    pub fn can_approve_payroll(&self) -> bool {
        matches!(self, EmployeeRole::Admin)
    }
}

impl Display for EmployeeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
