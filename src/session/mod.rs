use tracing::debug;

use crate::error::{MaintenanceError, MaintenanceResult, SessionError};

mod ssh;
#[cfg(test)]
pub(crate) mod scripted;

pub use ssh::{SshOptions, SshSession};

/// A synchronous prompt/response channel to the appliance shell.
///
/// One command is in flight at a time; `send` returns once the shell prompts
/// again.
pub trait Session {
    fn connect(&mut self, retries: u32) -> Result<(), SessionError>;
    fn disconnect(&mut self);
    fn send(&mut self, command: &str) -> Result<String, SessionError>;
}

/// Sends one command and attaches the command text to any transport failure.
pub fn exchange(session: &mut dyn Session, command: &str) -> MaintenanceResult<String> {
    debug!(command = %command.escape_debug(), "send");
    match session.send(command) {
        Ok(output) => {
            debug!(bytes = output.len(), "response");
            Ok(output)
        }
        Err(source) => Err(MaintenanceError::Transport {
            command: command.to_string(),
            source,
        }),
    }
}
