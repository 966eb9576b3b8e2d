use std::time::Duration;

use tracing::{info, warn};

use crate::core::{CommandSet, Procedure, VacuumRun};
use crate::error::MaintenanceResult;
use crate::session::{Session, exchange};
use crate::toggle::{self, ToggleOptions};

/// Number of end-of-input signals after the last target's engine exits:
/// one for the database user's shell, one for the superuser shell.
const SHELL_UNWIND: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VacuumOptions {
    /// Pause after vacuuming the first target, before quitting its shell.
    pub settle: Duration,
    pub toggle: ToggleOptions,
}

impl Default for VacuumOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
            toggle: ToggleOptions::default(),
        }
    }
}

/// Vacuums each target through the interactive shell while services stay up.
///
/// A stale `postmaster.pid` on any target means the engine is not really
/// running; the short run is abandoned and the long procedure's result is
/// returned in its place.
pub fn short_vacuum(
    session: &mut dyn Session,
    commands: &CommandSet,
    opts: &VacuumOptions,
) -> MaintenanceResult<VacuumRun> {
    let mut run = VacuumRun::new(Procedure::Short);

    for (idx, target) in commands.targets.iter().enumerate() {
        let entry = exchange(session, &commands.interactive_shell(target))?;
        if entry.contains(&commands.stale_lock_marker) {
            warn!(database = %target, "stale lock file, escalating to long vacuum");
            return long_vacuum(session, commands, opts);
        }
        info!(database = %target, "entered interactive database shell");
        run.record(entry);

        run.record(exchange(session, &commands.vacuum_interactive)?);
        info!(database = %target, "vacuum analyze finished");
        if idx == 0 && !opts.settle.is_zero() {
            std::thread::sleep(opts.settle);
        }
        run.record(exchange(session, &commands.quit_db_shell)?);
    }

    toggle::set_service_state(session, commands, true, &opts.toggle)?;
    Ok(run)
}

/// Vacuums each target in single-user mode with every service stopped.
pub fn long_vacuum(
    session: &mut dyn Session,
    commands: &CommandSet,
    opts: &VacuumOptions,
) -> MaintenanceResult<VacuumRun> {
    let mut run = VacuumRun::new(Procedure::Long);

    toggle::set_service_state(session, commands, false, &opts.toggle)?;
    info!("services offline, leaving the CLI");
    run.record(exchange(session, &commands.exit_cli)?);
    run.record(exchange(session, &commands.elevate)?);
    run.record(exchange(session, &commands.switch_db_user)?);

    for target in &commands.targets {
        run.record(exchange(session, &commands.single_user_engine(target))?);
        run.record(exchange(session, &commands.vacuum_single_user)?);
        run.record(exchange(session, &commands.end_of_input)?);
        info!(database = %target, "single-user vacuum finished");
    }
    for _ in 0..SHELL_UNWIND {
        run.record(exchange(session, &commands.end_of_input)?);
    }

    toggle::set_service_state(session, commands, true, &opts.toggle)?;
    Ok(run)
}

/// Commands a procedure sends when nothing goes wrong, toggle polls included
/// once. Used for dry runs.
pub fn planned_commands(procedure: Procedure, commands: &CommandSet) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    match procedure {
        Procedure::Short => {
            for target in &commands.targets {
                out.push(commands.interactive_shell(target));
                out.push(commands.vacuum_interactive.clone());
                out.push(commands.quit_db_shell.clone());
            }
        }
        Procedure::Long => {
            out.extend(owned(toggle::attempt_commands(commands, false)));
            out.push(commands.exit_cli.clone());
            out.push(commands.elevate.clone());
            out.push(commands.switch_db_user.clone());
            for target in &commands.targets {
                out.push(commands.single_user_engine(target));
                out.push(commands.vacuum_single_user.clone());
                out.push(commands.end_of_input.clone());
            }
            for _ in 0..SHELL_UNWIND {
                out.push(commands.end_of_input.clone());
            }
        }
    }
    out.extend(owned(toggle::attempt_commands(commands, true)));
    out
}

fn owned(commands: Vec<&str>) -> impl Iterator<Item = String> + '_ {
    commands.into_iter().map(str::to_string)
}
