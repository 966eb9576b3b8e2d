use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("session I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("no prompt from the appliance within {0:?}")]
    Timeout(Duration),
    #[error("the remote shell closed the session")]
    Closed,
    #[error("the session is not connected")]
    NotConnected,
}

#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("transport failed while sending {command:?}")]
    Transport {
        command: String,
        #[source]
        source: SessionError,
    },
    #[error("appliance output has no `{field}` field")]
    Parse { field: &'static str, raw: String },
    #[error("`{field}` value out of range")]
    OutOfRange { field: &'static str, raw: String },
    #[error("services did not report {state} after {attempts} attempt(s)")]
    Timeout {
        state: &'static str,
        attempts: u32,
        /// Parse failure of the final poll, if that is how it failed.
        #[source]
        last_error: Option<Box<MaintenanceError>>,
    },
}

impl MaintenanceError {
    pub fn missing(field: &'static str, raw: &str) -> Self {
        MaintenanceError::Parse {
            field,
            raw: raw.to_string(),
        }
    }

    /// Raw appliance text attached to a parse failure, including one that
    /// ended a toggle timeout.
    pub fn raw(&self) -> Option<&str> {
        match self {
            MaintenanceError::Parse { raw, .. } | MaintenanceError::OutOfRange { raw, .. } => {
                Some(raw)
            }
            MaintenanceError::Timeout {
                last_error: Some(last),
                ..
            } => last.raw(),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, MaintenanceError::Transport { .. })
    }
}

pub type MaintenanceResult<T> = Result<T, MaintenanceError>;
