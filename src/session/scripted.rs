use std::collections::{HashMap, VecDeque};

use crate::error::SessionError;
use crate::session::Session;

/// In-memory appliance double. Replies are queued per command; the last queued
/// reply for a command repeats once the queue is down to one entry. Unknown
/// commands answer with an empty string.
#[derive(Debug, Default)]
pub(crate) struct ScriptedSession {
    replies: HashMap<String, VecDeque<String>>,
    fail_on: Option<(String, usize)>,
    pub sent: Vec<String>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, command: &str, output: &str) -> Self {
        self.replies
            .entry(command.to_string())
            .or_default()
            .push_back(output.to_string());
        self
    }

    /// Fails the `nth` (1-based) send of `command` with a closed session.
    pub fn fail_on(mut self, command: &str, nth: usize) -> Self {
        self.fail_on = Some((command.to_string(), nth));
        self
    }

    pub fn count(&self, command: &str) -> usize {
        self.sent.iter().filter(|c| c.as_str() == command).count()
    }
}

impl Session for ScriptedSession {
    fn connect(&mut self, _retries: u32) -> Result<(), SessionError> {
        Ok(())
    }

    fn disconnect(&mut self) {}

    fn send(&mut self, command: &str) -> Result<String, SessionError> {
        self.sent.push(command.to_string());
        if let Some((fail_cmd, nth)) = &self.fail_on {
            if fail_cmd == command && self.count(command) == *nth {
                return Err(SessionError::Closed);
            }
        }
        let Some(queue) = self.replies.get_mut(command) else {
            return Ok(String::new());
        };
        let reply = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(reply)
    }
}
