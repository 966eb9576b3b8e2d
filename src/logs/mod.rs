use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::{DatabaseStatus, MaintenancePlan, VacuumRun};

const MAX_CMD_OUTPUT_BYTES: usize = 64 * 1024;

#[derive(Debug, Serialize)]
struct MaintenanceLog {
    schema_version: &'static str,
    tool_version: String,
    command: String,
    host: String,
    started_at: String,
    finished_at: String,
    plan: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    procedure: Option<String>,
    escalated: bool,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    status_outputs: Vec<String>,
    outputs: Vec<String>,
}

/// Everything recorded about one maintenance run.
#[derive(Debug, Clone)]
pub struct RunRecord<'a> {
    pub command: &'a str,
    pub host: &'a str,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
    pub plan: MaintenancePlan,
    pub status: Option<&'a DatabaseStatus>,
    pub run: Option<&'a VacuumRun>,
    pub error: Option<String>,
}

impl RunRecord<'_> {
    fn escalated(&self) -> bool {
        self.plan == MaintenancePlan::ShortVacuum
            && self
                .run
                .is_some_and(|r| r.procedure == crate::core::Procedure::Long)
    }
}

pub fn write_run_log(logs_dir: &Path, record: &RunRecord<'_>) -> Result<PathBuf> {
    let status = if record.error.is_some() {
        "error"
    } else {
        "success"
    };

    let log = MaintenanceLog {
        schema_version: "1.0",
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        command: record.command.to_string(),
        host: record.host.to_string(),
        started_at: format_ts(record.started_at),
        finished_at: format_ts(record.finished_at),
        plan: record.plan.as_str().to_string(),
        procedure: record.run.map(|r| r.procedure.as_str().to_string()),
        escalated: record.escalated(),
        status: status.to_string(),
        error: record.error.clone(),
        status_outputs: record
            .status
            .map(|s| {
                s.raw_outputs
                    .iter()
                    .map(|o| truncate_string(o, MAX_CMD_OUTPUT_BYTES))
                    .collect()
            })
            .unwrap_or_default(),
        outputs: record
            .run
            .map(|r| {
                r.outputs
                    .iter()
                    .map(|o| truncate_string(o, MAX_CMD_OUTPUT_BYTES))
                    .collect()
            })
            .unwrap_or_default(),
    };

    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create log directory: {}", logs_dir.display()))?;
    let path = unique_log_path(logs_dir, record.command, record.started_at);
    let json = serde_json::to_vec_pretty(&log).context("failed to serialize run log")?;
    std::fs::write(&path, json)
        .with_context(|| format!("failed to write run log: {}", path.display()))?;
    Ok(path)
}

fn unique_log_path(logs_dir: &Path, command: &str, started_at: OffsetDateTime) -> PathBuf {
    let stamp = format!(
        "{:04}{:02}{:02}-{:02}{:02}{:02}",
        started_at.year(),
        u8::from(started_at.month()),
        started_at.day(),
        started_at.hour(),
        started_at.minute(),
        started_at.second()
    );
    let slug = command.replace(' ', "-");
    let mut path = logs_dir.join(format!("{slug}-{stamp}.json"));
    let mut n = 1;
    while path.exists() {
        path = logs_dir.join(format!("{slug}-{stamp}-{n}.json"));
        n += 1;
    }
    path
}

fn format_ts(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string())
}

fn truncate_string(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut idx = max_bytes;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx = idx.saturating_sub(1);
    }
    let head = &s[..idx];
    format!("{head}\n...(truncated, total={} bytes)", s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Procedure;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn make_temp_dir() -> PathBuf {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir()
            .join(format!("srpvac-log-test-{}-{seq}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn write_run_log_records_escalation_and_outputs() {
        let dir = make_temp_dir();
        let status = DatabaseStatus {
            raw_outputs: vec!["ok".to_string(), "GreaterThan1Billion : 7".to_string()],
            count_above_1b: 7,
            ..DatabaseStatus::default()
        };
        let run = VacuumRun {
            procedure: Procedure::Long,
            outputs: vec!["backend>".to_string()],
        };
        let now = OffsetDateTime::now_utc();

        let path = write_run_log(
            &dir,
            &RunRecord {
                command: "triage",
                host: "srp01",
                started_at: now,
                finished_at: now,
                plan: MaintenancePlan::ShortVacuum,
                status: Some(&status),
                run: Some(&run),
                error: None,
            },
        )
        .expect("write log");

        let bytes = std::fs::read(&path).expect("read log");
        let v: serde_json::Value = serde_json::from_slice(&bytes).expect("parse json");
        assert_eq!(v.get("command").and_then(|s| s.as_str()), Some("triage"));
        assert_eq!(v.get("plan").and_then(|s| s.as_str()), Some("short_vacuum"));
        assert_eq!(v.get("procedure").and_then(|s| s.as_str()), Some("long"));
        assert_eq!(v.get("escalated").and_then(|b| b.as_bool()), Some(true));
        assert_eq!(v.get("status").and_then(|s| s.as_str()), Some("success"));
        assert_eq!(
            v.get("outputs").and_then(|o| o.as_array()).map(|a| a.len()),
            Some(1)
        );
        assert_eq!(
            v.get("status_outputs").and_then(|o| o.as_array()).map(|a| a.len()),
            Some(2)
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn same_second_runs_do_not_overwrite_each_other() {
        let dir = make_temp_dir();
        let now = OffsetDateTime::now_utc();
        let record = RunRecord {
            command: "services start",
            host: "srp01",
            started_at: now,
            finished_at: now,
            plan: MaintenancePlan::None,
            status: None,
            run: None,
            error: Some("services did not report online after 5 attempt(s)".to_string()),
        };
        let first = write_run_log(&dir, &record).expect("first");
        let second = write_run_log(&dir, &record).expect("second");
        assert_ne!(first, second);
        assert!(
            first
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("services-start-"))
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn truncate_string_respects_char_boundaries() {
        let s = "é".repeat(10);
        let out = truncate_string(&s, 5);
        assert!(out.starts_with("éé"));
        assert!(out.contains("truncated"));
    }
}
