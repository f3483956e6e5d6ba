//! Organizational scopes that partition memory and operations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ErpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Department {
    Sales,
    Inventory,
    Accounts,
    #[serde(rename = "HR")]
    Hr,
    Management,
}

impl Department {
    pub const ALL: [Department; 5] = [
        Department::Sales,
        Department::Inventory,
        Department::Accounts,
        Department::Hr,
        Department::Management,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Sales => "Sales",
            Department::Inventory => "Inventory",
            Department::Accounts => "Accounts",
            Department::Hr => "HR",
            Department::Management => "Management",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = ErpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sales" => Ok(Department::Sales),
            "inventory" => Ok(Department::Inventory),
            "accounts" | "accounting" | "finance" => Ok(Department::Accounts),
            "hr" | "human resources" => Ok(Department::Hr),
            "management" => Ok(Department::Management),
            other => Err(ErpError::Config(format!("Unknown department: {other}"))),
        }
    }
}
