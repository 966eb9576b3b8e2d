use tracing::info;

use crate::core::{
    CommandSet, DatabaseStatus, MaintenancePlan, ServiceRunState, TriageOutcome, VacuumRun,
};
use crate::error::MaintenanceResult;
use crate::parser;
use crate::session::{Session, exchange};
use crate::toggle;
use crate::vacuum::{self, VacuumOptions};

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub vacuum: VacuumOptions,
}

/// Runs queries and maintenance procedures against one appliance session.
#[derive(Debug, Clone)]
pub struct Engine {
    commands: CommandSet,
    opts: EngineOptions,
}

impl Engine {
    pub fn new(commands: CommandSet, opts: EngineOptions) -> Self {
        Self { commands, opts }
    }

    pub fn commands(&self) -> &CommandSet {
        &self.commands
    }

    /// Queries the aggregate status, and the transaction-id report only when
    /// the database is reachable.
    pub fn database_status(&self, session: &mut dyn Session) -> MaintenanceResult<DatabaseStatus> {
        let aggregate = exchange(session, &self.commands.db_status)?;
        if parser::is_database_unreachable(&aggregate, &self.commands) {
            info!("appliance cannot reach its database");
            return Ok(DatabaseStatus::unreachable(aggregate));
        }
        let transaction = exchange(session, &self.commands.db_transaction_status)?;
        parser::parse_database_status(&aggregate, &transaction, &self.commands)
    }

    pub fn service_state(&self, session: &mut dyn Session) -> MaintenanceResult<ServiceRunState> {
        let listing = exchange(session, &self.commands.service_listing)?;
        parser::parse_service_run_state(&listing)
    }

    pub fn set_service_state(
        &self,
        session: &mut dyn Session,
        online: bool,
    ) -> MaintenanceResult<ServiceRunState> {
        toggle::set_service_state(session, &self.commands, online, &self.opts.vacuum.toggle)
    }

    pub fn short_vacuum(&self, session: &mut dyn Session) -> MaintenanceResult<VacuumRun> {
        vacuum::short_vacuum(session, &self.commands, &self.opts.vacuum)
    }

    pub fn long_vacuum(&self, session: &mut dyn Session) -> MaintenanceResult<VacuumRun> {
        vacuum::long_vacuum(session, &self.commands, &self.opts.vacuum)
    }

    pub fn plan(
        &self,
        session: &mut dyn Session,
    ) -> MaintenanceResult<(DatabaseStatus, MaintenancePlan)> {
        let status = self.database_status(session)?;
        let plan = MaintenancePlan::classify(&status);
        info!(
            plan = %plan,
            unreachable = status.database_unreachable,
            above_1b = status.count_above_1b,
            above_1_5b = status.count_above_1_5b,
            above_2b = status.count_above_2b,
            "triage decision"
        );
        Ok((status, plan))
    }

    pub fn execute(
        &self,
        session: &mut dyn Session,
        plan: MaintenancePlan,
    ) -> MaintenanceResult<Option<VacuumRun>> {
        match plan {
            MaintenancePlan::None => Ok(None),
            MaintenancePlan::ShortVacuum => self.short_vacuum(session).map(Some),
            MaintenancePlan::LongVacuum => self.long_vacuum(session).map(Some),
        }
    }

    /// Inspects the database and runs whichever procedure it calls for.
    pub fn triage(&self, session: &mut dyn Session) -> MaintenanceResult<TriageOutcome> {
        let (status, plan) = self.plan(session)?;
        let run = self.execute(session, plan)?;
        Ok(TriageOutcome { status, plan, run })
    }
}
