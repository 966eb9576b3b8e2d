mod commands;
mod plan;
mod run;
mod status;

pub use commands::CommandSet;
pub use plan::MaintenancePlan;
pub use run::{Procedure, TriageOutcome, VacuumRun};
pub use status::{DatabaseStatus, ServiceRunState};
