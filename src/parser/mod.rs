use std::sync::LazyLock;

use regex::Regex;

use crate::core::{CommandSet, DatabaseStatus, ServiceRunState};
use crate::error::{MaintenanceError, MaintenanceResult};

static THRESHOLD_100M: LazyLock<Regex> = LazyLock::new(|| threshold_re("GreaterThan100Million"));
static THRESHOLD_500M: LazyLock<Regex> = LazyLock::new(|| threshold_re("GreaterThan500Million"));
static THRESHOLD_1B: LazyLock<Regex> = LazyLock::new(|| threshold_re("GreaterThan1Billion"));
static THRESHOLD_1_5B: LazyLock<Regex> = LazyLock::new(|| threshold_re(r"GreaterThan1\.5Billion"));
static THRESHOLD_2B: LazyLock<Regex> = LazyLock::new(|| threshold_re("GreaterThan2Billion"));

static APP_SERVER_WRAPPER: LazyLock<Regex> =
    LazyLock::new(|| service_re(r"JBoss\s+Application\s+Server\s+Wrapper"));
static APP_SERVER: LazyLock<Regex> = LazyLock::new(|| service_re(r"JBoss\s+Application\s+Server"));
static DATABASE: LazyLock<Regex> = LazyLock::new(|| service_re("PostgreSQL"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

fn threshold_re(label: &str) -> Regex {
    Regex::new(&format!(r"{label}\s*:\s*([0-9][0-9,]*)")).expect("valid regex")
}

fn service_re(label: &str) -> Regex {
    Regex::new(&format!(r"{label}(\s.*)?$")).expect("valid regex")
}

pub fn is_database_unreachable(aggregate: &str, commands: &CommandSet) -> bool {
    aggregate.contains(&commands.unreachable_marker)
}

/// Builds a [`DatabaseStatus`] from the aggregate status and the
/// transaction-id report.
///
/// An aggregate response carrying the unreachable marker short-circuits to an
/// unreachable status and `transaction` is ignored; callers should not issue
/// the second query in that case.
pub fn parse_database_status(
    aggregate: &str,
    transaction: &str,
    commands: &CommandSet,
) -> MaintenanceResult<DatabaseStatus> {
    if is_database_unreachable(aggregate, commands) {
        return Ok(DatabaseStatus::unreachable(aggregate));
    }

    Ok(DatabaseStatus {
        raw_outputs: vec![aggregate.to_string(), transaction.to_string()],
        count_above_100m: threshold(&THRESHOLD_100M, "GreaterThan100Million", transaction)?,
        count_above_500m: threshold(&THRESHOLD_500M, "GreaterThan500Million", transaction)?,
        count_above_1b: threshold(&THRESHOLD_1B, "GreaterThan1Billion", transaction)?,
        count_above_1_5b: threshold(&THRESHOLD_1_5B, "GreaterThan1.5Billion", transaction)?,
        count_above_2b: threshold(&THRESHOLD_2B, "GreaterThan2Billion", transaction)?,
        database_unreachable: false,
    })
}

fn threshold(re: &Regex, field: &'static str, text: &str) -> MaintenanceResult<u64> {
    let caps = re
        .captures(text)
        .ok_or_else(|| MaintenanceError::missing(field, text))?;
    let digits = caps[1].replace(',', "");
    digits.parse::<u64>().map_err(|_| MaintenanceError::OutOfRange {
        field,
        raw: text.to_string(),
    })
}

/// Extracts the state word of each subsystem from `show system services`.
pub fn parse_service_run_state(listing: &str) -> MaintenanceResult<ServiceRunState> {
    let mut app_server = None;
    let mut app_server_wrapper = None;
    let mut database = None;

    for line in listing.lines() {
        // The wrapper label contains the server label, so test it first.
        if let Some(caps) = APP_SERVER_WRAPPER.captures(line) {
            if app_server_wrapper.is_none() {
                app_server_wrapper = Some(state_word(caps.get(1)));
            }
        } else if let Some(caps) = APP_SERVER.captures(line) {
            if app_server.is_none() {
                app_server = Some(state_word(caps.get(1)));
            }
        } else if let Some(caps) = DATABASE.captures(line) {
            if database.is_none() {
                database = Some(state_word(caps.get(1)));
            }
        }
    }

    Ok(ServiceRunState {
        app_server: require(app_server, "JBoss Application Server", listing)?,
        app_server_wrapper: require(
            app_server_wrapper,
            "JBoss Application Server Wrapper",
            listing,
        )?,
        database: require(database, "PostgreSQL", listing)?,
    })
}

fn require(
    found: Option<Option<String>>,
    field: &'static str,
    listing: &str,
) -> MaintenanceResult<String> {
    found
        .flatten()
        .ok_or_else(|| MaintenanceError::missing(field, listing))
}

/// Second space-separated token of the normalized remainder. The remainder
/// keeps its leading whitespace, so for `   [ online ]` the tokens are
/// `["", "online", ""]`.
fn state_word(rest: Option<regex::Match<'_>>) -> Option<String> {
    let rest = rest?.as_str();
    let normalized = normalize(rest);
    let word = normalized.split(' ').nth(1)?;
    if word.is_empty() {
        return None;
    }
    Some(word.to_string())
}

/// Drops the bracket column delimiters and collapses whitespace runs.
pub fn normalize(text: &str) -> String {
    let stripped = text.replace(['[', ']'], "");
    WHITESPACE.replace_all(&stripped, " ").into_owned()
}
