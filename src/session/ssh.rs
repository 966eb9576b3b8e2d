use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::error::SessionError;
use crate::session::Session;

const DISCONNECT_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct SshOptions {
    pub program: String,
    pub host: String,
    pub user: String,
    pub port: u16,
    pub password: Option<String>,
    pub command_timeout: Duration,
    pub prompt: Regex,
}

struct Connection {
    child: Child,
    stdin: ChildStdin,
    rx: Receiver<Vec<u8>>,
}

/// Drives the appliance shell through a system `ssh -tt` child process.
pub struct SshSession {
    opts: SshOptions,
    conn: Option<Connection>,
}

impl SshSession {
    pub fn new(opts: SshOptions) -> Self {
        Self { opts, conn: None }
    }

    fn spawn(&self) -> Result<Connection, SessionError> {
        let destination = format!("{}@{}", self.opts.user, self.opts.host);
        let port = self.opts.port.to_string();

        let (mut command, launcher) = match &self.opts.password {
            Some(password) => {
                let mut command = Command::new("sshpass");
                command.arg("-e").arg(&self.opts.program).env("SSHPASS", password);
                (command, "sshpass")
            }
            None => (Command::new(&self.opts.program), self.opts.program.as_str()),
        };
        command
            .args(["-tt", "-p", port.as_str(), destination.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| SessionError::Spawn {
            program: launcher.to_string(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or(SessionError::NotConnected)?;
        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            forward(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward(stderr, tx);
        }

        Ok(Connection { child, stdin, rx })
    }

    fn read_until_prompt(&mut self) -> Result<String, SessionError> {
        let timeout = self.opts.command_timeout;
        let prompt = &self.opts.prompt;
        let conn = self.conn.as_mut().ok_or(SessionError::NotConnected)?;

        let deadline = Instant::now() + timeout;
        let mut buf: Vec<u8> = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SessionError::Timeout(timeout));
            }
            match conn.rx.recv_timeout(remaining) {
                Ok(chunk) => {
                    buf.extend_from_slice(&chunk);
                    let text = String::from_utf8_lossy(&buf);
                    if prompt.is_match(&text) {
                        return Ok(text.into_owned());
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Err(SessionError::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(SessionError::Closed),
            }
        }
    }

    fn close(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let Connection {
            mut child, stdin, ..
        } = conn;
        drop(stdin);
        match child.wait_timeout(DISCONNECT_GRACE) {
            Ok(Some(_)) => {}
            _ => {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

impl Session for SshSession {
    fn connect(&mut self, retries: u32) -> Result<(), SessionError> {
        let mut last_err = SessionError::NotConnected;
        for attempt in 0..=retries {
            self.close();
            self.conn = Some(self.spawn()?);
            match self.read_until_prompt() {
                Ok(banner) => {
                    debug!(host = %self.opts.host, bytes = banner.len(), "connected");
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        host = %self.opts.host,
                        attempt = attempt + 1,
                        error = %err,
                        "connect failed"
                    );
                    last_err = err;
                }
            }
        }
        self.close();
        Err(last_err)
    }

    fn disconnect(&mut self) {
        self.close();
    }

    fn send(&mut self, command: &str) -> Result<String, SessionError> {
        let conn = self.conn.as_mut().ok_or(SessionError::NotConnected)?;
        let mut line = command.as_bytes().to_vec();
        // Control characters such as end-of-input go out bare.
        if !command.chars().all(|c| c.is_ascii_control()) {
            line.push(b'\n');
        }
        conn.stdin.write_all(&line)?;
        conn.stdin.flush()?;

        let raw = self.read_until_prompt()?;
        Ok(clean_response(&raw, command))
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn forward(mut reader: impl Read + Send + 'static, tx: mpsc::Sender<Vec<u8>>) {
    thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(chunk[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Removes the echoed command line and the trailing prompt line.
fn clean_response(raw: &str, command: &str) -> String {
    let body = match raw.rfind('\n') {
        Some(idx) => &raw[..idx],
        None => "",
    };
    let mut lines: Vec<&str> = body.lines().collect();
    if lines
        .first()
        .is_some_and(|first| first.trim() == command.trim() && !command.trim().is_empty())
    {
        lines.remove(0);
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_response_drops_echo_and_prompt() {
        let raw = "show system services\r\nPostgreSQL [ online ]\r\nsvadmin@srp> ";
        assert_eq!(
            clean_response(raw, "show system services"),
            "PostgreSQL [ online ]"
        );
    }

    #[test]
    fn clean_response_of_bare_prompt_is_empty() {
        assert_eq!(clean_response("srp# ", "\x04"), "");
        assert_eq!(clean_response("\\q\r\nsvadmin> ", "\\q"), "");
    }

    #[test]
    fn clean_response_keeps_output_without_echo() {
        let raw = "VACUUM\nsv_stat=# ";
        assert_eq!(clean_response(raw, "vacuum analyze;"), "VACUUM");
    }

    #[test]
    fn send_before_connect_is_not_connected() {
        let mut session = SshSession::new(SshOptions {
            program: "ssh".to_string(),
            host: "localhost".to_string(),
            user: "svadmin".to_string(),
            port: 22,
            password: None,
            command_timeout: Duration::from_secs(1),
            prompt: Regex::new(r"[#>$]\s*$").expect("regex"),
        });
        assert!(matches!(
            session.send("show system services"),
            Err(SessionError::NotConnected)
        ));
    }
}
