use std::time::Duration;

use tracing::{info, warn};

use crate::core::{CommandSet, ServiceRunState};
use crate::error::{MaintenanceError, MaintenanceResult};
use crate::parser;
use crate::session::{Session, exchange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOptions {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub backoff_max: Duration,
}

impl Default for ToggleOptions {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(2),
            backoff_max: Duration::from_secs(30),
        }
    }
}

pub const fn state_word(online: bool) -> &'static str {
    if online { "online" } else { "offline" }
}

/// Service-control pair for one direction. Start brings the database up
/// before the application server; stop also takes the database down first.
pub fn control_commands(commands: &CommandSet, online: bool) -> [&str; 2] {
    if online {
        [commands.start_db.as_str(), commands.start_app_server.as_str()]
    } else {
        [commands.stop_db.as_str(), commands.stop_app_server.as_str()]
    }
}

/// Commands one toggle attempt sends, in order.
pub fn attempt_commands(commands: &CommandSet, online: bool) -> Vec<&str> {
    let mut sequence = vec![commands.enter_cli.as_str()];
    sequence.extend(control_commands(commands, online));
    sequence.push(commands.service_listing.as_str());
    sequence
}

/// Brings all three subsystems online or offline and confirms it from the
/// service listing.
///
/// Every attempt re-enters the CLI and re-issues the control commands. Polls
/// that show the wrong state or cannot be parsed are retried with doubling
/// backoff up to `max_attempts`; transport failures abort at once.
pub fn set_service_state(
    session: &mut dyn Session,
    commands: &CommandSet,
    online: bool,
    opts: &ToggleOptions,
) -> MaintenanceResult<ServiceRunState> {
    let expected = state_word(online);
    let attempts = opts.max_attempts.max(1);
    let mut delay = opts.backoff;
    let mut last_error = None;

    for attempt in 1..=attempts {
        exchange(session, &commands.enter_cli)?;
        for command in control_commands(commands, online) {
            exchange(session, command)?;
        }
        let listing = exchange(session, &commands.service_listing)?;

        match parser::parse_service_run_state(&listing) {
            Ok(state) if state.all_contain(expected) => {
                info!(attempt, state = expected, "services confirmed");
                return Ok(state);
            }
            Ok(state) => {
                warn!(
                    attempt,
                    expected,
                    app_server = %state.app_server,
                    app_server_wrapper = %state.app_server_wrapper,
                    database = %state.database,
                    "services not yet in the expected state"
                );
                last_error = None;
            }
            Err(err) => {
                warn!(attempt, error = %err, "service listing could not be parsed");
                last_error = Some(Box::new(err));
            }
        }

        if attempt < attempts && !delay.is_zero() {
            std::thread::sleep(delay);
            delay = std::cmp::min(delay.saturating_mul(2), opts.backoff_max);
        }
    }

    Err(MaintenanceError::Timeout {
        state: expected,
        attempts,
        last_error,
    })
}
