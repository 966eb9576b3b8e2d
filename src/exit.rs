use std::fmt;

use crate::error::MaintenanceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    InvalidArgs,
    MaintenanceFailed,
    TransportFailed,
}

impl ExitCode {
    pub const fn as_i32(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::InvalidArgs => 2,
            ExitCode::MaintenanceFailed => 10,
            ExitCode::TransportFailed => 20,
        }
    }
}

#[derive(Debug)]
pub struct ExitError {
    pub code: ExitCode,
    pub err: anyhow::Error,
}

impl ExitError {
    pub fn new(code: ExitCode, err: anyhow::Error) -> Self {
        Self { code, err }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl std::error::Error for ExitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.err.as_ref())
    }
}

/// Explicit [`ExitError`] codes win; otherwise a transport failure anywhere
/// in the chain maps to 20 and everything else to 10.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(exit) = err.downcast_ref::<ExitError>() {
        return exit.code.as_i32();
    }
    let transport = err.chain().any(|e| {
        e.downcast_ref::<MaintenanceError>()
            .is_some_and(MaintenanceError::is_transport)
            || e.downcast_ref::<crate::error::SessionError>().is_some()
    });
    if transport {
        return ExitCode::TransportFailed.as_i32();
    }
    ExitCode::MaintenanceFailed.as_i32()
}

pub fn invalid_args(message: impl Into<String>) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, anyhow::anyhow!(message.into())).into()
}

pub fn invalid_args_err(err: anyhow::Error) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, err).into()
}

pub fn transport_err(err: anyhow::Error) -> anyhow::Error {
    ExitError::new(ExitCode::TransportFailed, err).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use anyhow::Context;

    #[test]
    fn transport_failure_maps_to_20_through_context() {
        let err: anyhow::Result<()> = Err(MaintenanceError::Transport {
            command: "svcli".to_string(),
            source: SessionError::Closed,
        })
        .context("triage failed");
        assert_eq!(exit_code(&err.unwrap_err()), 20);
    }

    #[test]
    fn parse_and_timeout_map_to_10() {
        let parse = anyhow::Error::from(MaintenanceError::missing("PostgreSQL", ""));
        assert_eq!(exit_code(&parse), 10);
        let timeout = anyhow::Error::from(MaintenanceError::Timeout {
            state: "online",
            attempts: 5,
            last_error: None,
        });
        assert_eq!(exit_code(&timeout), 10);
    }

    #[test]
    fn explicit_exit_error_wins() {
        assert_eq!(exit_code(&invalid_args("bad flag")), 2);
    }
}
