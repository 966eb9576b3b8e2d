use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{DatabaseStatus, MaintenancePlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Procedure {
    Short,
    Long,
}

impl Procedure {
    pub const fn as_str(self) -> &'static str {
        match self {
            Procedure::Short => "short",
            Procedure::Long => "long",
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-empty command outputs of one maintenance procedure, in send order.
///
/// `procedure` is the procedure that actually produced the outputs: a short
/// vacuum that escalated reports `Long`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacuumRun {
    pub procedure: Procedure,
    pub outputs: Vec<String>,
}

impl VacuumRun {
    pub fn new(procedure: Procedure) -> Self {
        Self {
            procedure,
            outputs: Vec::new(),
        }
    }

    pub fn record(&mut self, output: String) {
        if !output.is_empty() {
            self.outputs.push(output);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageOutcome {
    pub status: DatabaseStatus,
    pub plan: MaintenancePlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<VacuumRun>,
}

impl TriageOutcome {
    pub fn escalated(&self) -> bool {
        self.plan == MaintenancePlan::ShortVacuum
            && self
                .run
                .as_ref()
                .is_some_and(|run| run.procedure == Procedure::Long)
    }
}
