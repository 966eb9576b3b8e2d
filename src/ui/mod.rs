use anyhow::Error;
use std::io::{self, Write};

use crate::core::{
    DatabaseStatus, MaintenancePlan, Procedure, ServiceRunState, TriageOutcome, VacuumRun,
};
use crate::error::MaintenanceError;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error, verbose: bool) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let raw = err
        .chain()
        .find_map(|e| e.downcast_ref::<MaintenanceError>())
        .and_then(MaintenanceError::raw);
    if let Some(raw) = raw {
        if verbose {
            let _ = writeln!(stderr, "appliance output:");
            for line in raw.lines() {
                let _ = writeln!(stderr, "  | {line}");
            }
        } else {
            let _ = writeln!(
                stderr,
                "next: re-run with `--verbose` to see the appliance output"
            );
        }
    }
}

pub fn print_database_status(status: &DatabaseStatus, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    if status.database_unreachable {
        let _ = writeln!(
            out,
            "database: {}",
            paint("unreachable", Tone::Bad, cfg.color)
        );
        return;
    }
    let _ = writeln!(out, "database: {}", paint("reachable", Tone::Good, cfg.color));
    let rows = [
        ("> 100 million", status.count_above_100m, false),
        ("> 500 million", status.count_above_500m, false),
        ("> 1 billion", status.count_above_1b, true),
        ("> 1.5 billion", status.count_above_1_5b, true),
        ("> 2 billion", status.count_above_2b, true),
    ];
    for (label, count, actionable) in rows {
        let value = format_count(count);
        let value = if actionable && count > 0 {
            paint(&value, Tone::Bad, cfg.color)
        } else {
            value
        };
        let _ = writeln!(out, "  {label:<14} {value}");
    }
    if cfg.verbose {
        for raw in &status.raw_outputs {
            let _ = writeln!(out);
            for line in raw.lines() {
                let _ = writeln!(out, "  | {line}");
            }
        }
    }
}

pub fn print_service_state(state: &ServiceRunState, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    for (label, word) in state.entries() {
        let tone = if word.contains("online") {
            Tone::Good
        } else {
            Tone::Bad
        };
        let _ = writeln!(out, "{label:<34} {}", paint(word, tone, cfg.color));
    }
}

pub fn print_triage(outcome: &TriageOutcome, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    print_database_status(&outcome.status, cfg);
    let mut out = io::stdout().lock();
    let _ = writeln!(out);
    let _ = writeln!(out, "plan: {}", plan_label(outcome.plan));
    if outcome.escalated() {
        let _ = writeln!(
            out,
            "note: stale postmaster.pid found, escalated to the long vacuum"
        );
    }
    drop(out);
    if let Some(run) = &outcome.run {
        print_run(run, cfg);
    }
}

pub fn print_run(run: &VacuumRun, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "{} vacuum finished, services {} ({} output block(s))",
        run.procedure,
        paint("online", Tone::Good, cfg.color),
        run.outputs.len()
    );
    if cfg.verbose {
        for output in &run.outputs {
            for line in output.lines() {
                let _ = writeln!(out, "  | {line}");
            }
        }
    }
}

pub fn print_planned_commands(title: &str, commands: &[String], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "dry-run: {title} would send:");
    for (idx, command) in commands.iter().enumerate() {
        let _ = writeln!(out, "  {:>2}. {}", idx + 1, display_command(command));
    }
}

pub fn plan_label(plan: MaintenancePlan) -> &'static str {
    match plan {
        MaintenancePlan::None => "none (no maintenance needed)",
        MaintenancePlan::ShortVacuum => "short vacuum (services stay online)",
        MaintenancePlan::LongVacuum => "long vacuum (services stopped)",
    }
}

pub fn procedure_title(procedure: Procedure) -> &'static str {
    match procedure {
        Procedure::Short => "short vacuum",
        Procedure::Long => "long vacuum",
    }
}

/// Control characters are shown as caret notation (`^D`).
pub fn display_command(command: &str) -> String {
    command
        .chars()
        .map(|c| {
            if c.is_ascii_control() {
                format!("^{}", ((c as u8) ^ 0x40) as char)
            } else {
                c.to_string()
            }
        })
        .collect()
}

pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, c) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Good,
    Bad,
}

fn paint(s: &str, tone: Tone, color: bool) -> String {
    if !color {
        return s.to_string();
    }
    let code = match tone {
        Tone::Good => "32",
        Tone::Bad => "31",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}
