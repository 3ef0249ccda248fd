use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EmploymentStatus {
    #[default]
    Active,
    Fired,
}

impl EmploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentStatus::Active => "active",
            EmploymentStatus::Fired => "fired",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "active" => Some(EmploymentStatus::Active),
            "fired" => Some(EmploymentStatus::Fired),
            _ => None,
        }
    }
}

impl Display for EmploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
