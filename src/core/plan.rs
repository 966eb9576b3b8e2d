use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::DatabaseStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenancePlan {
    None,
    ShortVacuum,
    LongVacuum,
}

impl MaintenancePlan {
    /// Picks the procedure for a status snapshot. An unreachable database
    /// always wins over the transaction counters.
    pub fn classify(status: &DatabaseStatus) -> Self {
        if status.database_unreachable {
            MaintenancePlan::LongVacuum
        } else if status.has_wraparound_pressure() {
            MaintenancePlan::ShortVacuum
        } else {
            MaintenancePlan::None
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            MaintenancePlan::None => "none",
            MaintenancePlan::ShortVacuum => "short_vacuum",
            MaintenancePlan::LongVacuum => "long_vacuum",
        }
    }
}

impl fmt::Display for MaintenancePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
