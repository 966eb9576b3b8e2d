use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::session::SshOptions;
use crate::toggle::ToggleOptions;
use crate::vacuum::VacuumOptions;

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub ui: UiConfig,
    pub logs: LogsConfig,
    pub appliance: ApplianceConfig,
    pub toggle: ToggleConfig,
    pub vacuum: VacuumConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogsConfig {
    pub dir: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplianceConfig {
    pub host: Option<String>,
    pub user: String,
    pub port: u16,
    pub ssh_program: String,
    pub connect_retries: u32,
    pub command_timeout_secs: u64,
    pub prompt_regex: String,
    #[serde(skip)]
    pub password: Option<String>,
    pub password_set: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToggleConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub backoff_max_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VacuumConfig {
    pub settle_ms: u64,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            ui: UiConfig { color: true },
            logs: LogsConfig {
                dir: "~/.config/srpvac/logs".to_string(),
            },
            appliance: ApplianceConfig {
                host: None,
                user: "svadmin".to_string(),
                port: 22,
                ssh_program: "ssh".to_string(),
                connect_retries: 2,
                command_timeout_secs: 30,
                prompt_regex: r"[#>$]\s*$".to_string(),
                password: None,
                password_set: false,
            },
            toggle: ToggleConfig {
                max_attempts: 5,
                backoff_ms: 2_000,
                backoff_max_ms: 30_000,
            },
            vacuum: VacuumConfig { settle_ms: 500 },
            config_path: None,
        }
    }
}

impl EffectiveConfig {
    pub fn vacuum_options(&self) -> VacuumOptions {
        VacuumOptions {
            settle: Duration::from_millis(self.vacuum.settle_ms),
            toggle: ToggleOptions {
                max_attempts: self.toggle.max_attempts,
                backoff: Duration::from_millis(self.toggle.backoff_ms),
                backoff_max: Duration::from_millis(self.toggle.backoff_max_ms),
            },
        }
    }

    pub fn ssh_options(&self) -> Result<SshOptions> {
        let appliance = &self.appliance;
        let host = appliance
            .host
            .clone()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| {
                anyhow!("no appliance host configured (set SRP_HOST, --host or [appliance].host)")
            })?;
        let prompt = Regex::new(&appliance.prompt_regex)
            .with_context(|| format!("invalid prompt_regex: {}", appliance.prompt_regex))?;
        Ok(SshOptions {
            program: appliance.ssh_program.clone(),
            host,
            user: appliance.user.clone(),
            port: appliance.port,
            password: appliance.password.clone(),
            command_timeout: Duration::from_secs(appliance.command_timeout_secs),
            prompt,
        })
    }

    pub fn logs_dir(&self, home_dir: &Path) -> PathBuf {
        expand_tilde(&self.logs.dir, home_dir)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    ui: Option<RawUiConfig>,
    logs: Option<RawLogsConfig>,
    appliance: Option<RawApplianceConfig>,
    toggle: Option<RawToggleConfig>,
    vacuum: Option<RawVacuumConfig>,
}

#[derive(Debug, Deserialize)]
struct RawUiConfig {
    color: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawLogsConfig {
    dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawApplianceConfig {
    host: Option<String>,
    user: Option<String>,
    port: Option<u16>,
    ssh_program: Option<String>,
    connect_retries: Option<u32>,
    command_timeout_secs: Option<u64>,
    prompt_regex: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawToggleConfig {
    max_attempts: Option<u32>,
    backoff_ms: Option<u64>,
    backoff_max_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawVacuumConfig {
    settle_ms: Option<u64>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/srpvac/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s).context("failed to parse config file (TOML)")?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    } else if config_path.is_some() {
        return Err(anyhow!("config file not found: {}", path.display()));
    }

    apply_env_overrides(&mut cfg)?;
    validate(&cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
    }

    if let Some(logs) = raw.logs {
        if let Some(dir) = logs.dir {
            cfg.logs.dir = dir;
        }
    }

    if let Some(appliance) = raw.appliance {
        if let Some(host) = appliance.host {
            cfg.appliance.host = Some(host);
        }
        if let Some(user) = appliance.user {
            cfg.appliance.user = user;
        }
        if let Some(port) = appliance.port {
            cfg.appliance.port = port;
        }
        if let Some(ssh_program) = appliance.ssh_program {
            cfg.appliance.ssh_program = ssh_program;
        }
        if let Some(connect_retries) = appliance.connect_retries {
            cfg.appliance.connect_retries = connect_retries;
        }
        if let Some(command_timeout_secs) = appliance.command_timeout_secs {
            cfg.appliance.command_timeout_secs = command_timeout_secs;
        }
        if let Some(prompt_regex) = appliance.prompt_regex {
            cfg.appliance.prompt_regex = prompt_regex;
        }
    }

    if let Some(toggle) = raw.toggle {
        if let Some(max_attempts) = toggle.max_attempts {
            cfg.toggle.max_attempts = max_attempts;
        }
        if let Some(backoff_ms) = toggle.backoff_ms {
            cfg.toggle.backoff_ms = backoff_ms;
        }
        if let Some(backoff_max_ms) = toggle.backoff_max_ms {
            cfg.toggle.backoff_max_ms = backoff_max_ms;
        }
    }

    if let Some(vacuum) = raw.vacuum {
        if let Some(settle_ms) = vacuum.settle_ms {
            cfg.vacuum.settle_ms = settle_ms;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("SRPVAC_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "SRPVAC_UI_COLOR")?;
    }
    if let Some(v) = non_empty_env("SRPVAC_LOG_DIR") {
        cfg.logs.dir = v;
    }
    if let Some(v) = non_empty_env("SRP_HOST") {
        cfg.appliance.host = Some(v);
    }
    if let Some(v) = non_empty_env("SRP_USER") {
        cfg.appliance.user = v;
    }
    if let Some(v) = non_empty_env("SRP_PASS") {
        cfg.appliance.password = Some(v);
    }
    if let Some(v) = non_empty_env("SRPVAC_SSH_PROGRAM") {
        cfg.appliance.ssh_program = v;
    }
    if let Ok(v) = std::env::var("SRPVAC_CONNECT_RETRIES") {
        cfg.appliance.connect_retries = parse_num(&v).with_context(|| "SRPVAC_CONNECT_RETRIES")?;
    }
    if let Ok(v) = std::env::var("SRPVAC_COMMAND_TIMEOUT_SECS") {
        cfg.appliance.command_timeout_secs =
            parse_num(&v).with_context(|| "SRPVAC_COMMAND_TIMEOUT_SECS")?;
    }
    if let Ok(v) = std::env::var("SRPVAC_TOGGLE_MAX_ATTEMPTS") {
        cfg.toggle.max_attempts = parse_num(&v).with_context(|| "SRPVAC_TOGGLE_MAX_ATTEMPTS")?;
    }
    if let Ok(v) = std::env::var("SRPVAC_TOGGLE_BACKOFF_MS") {
        cfg.toggle.backoff_ms = parse_num(&v).with_context(|| "SRPVAC_TOGGLE_BACKOFF_MS")?;
    }
    if let Ok(v) = std::env::var("SRPVAC_TOGGLE_BACKOFF_MAX_MS") {
        cfg.toggle.backoff_max_ms =
            parse_num(&v).with_context(|| "SRPVAC_TOGGLE_BACKOFF_MAX_MS")?;
    }
    if let Ok(v) = std::env::var("SRPVAC_VACUUM_SETTLE_MS") {
        cfg.vacuum.settle_ms = parse_num(&v).with_context(|| "SRPVAC_VACUUM_SETTLE_MS")?;
    }

    cfg.appliance.password_set = cfg.appliance.password.is_some();
    Ok(())
}

fn validate(cfg: &EffectiveConfig) -> Result<()> {
    if cfg.toggle.max_attempts == 0 {
        return Err(anyhow!("toggle.max_attempts must be at least 1"));
    }
    if cfg.appliance.command_timeout_secs == 0 {
        return Err(anyhow!("appliance.command_timeout_secs must be greater than 0"));
    }
    Regex::new(&cfg.appliance.prompt_regex).with_context(|| {
        format!(
            "invalid appliance.prompt_regex: {}",
            cfg.appliance.prompt_regex
        )
    })?;
    Ok(())
}

fn non_empty_env(key: &str) -> Option<String> {
    let v = std::env::var(key).ok()?;
    let v = v.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

fn parse_num<T>(s: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(s.trim().parse::<T>()?)
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}

fn expand_tilde(path: &str, home_dir: &Path) -> PathBuf {
    if path == "~" {
        return home_dir.to_path_buf();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return home_dir.join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_config_overrides_only_given_fields() {
        let mut cfg = EffectiveConfig::default();
        let raw: RawConfig = toml::from_str(
            r#"
[appliance]
host = "srp01"
port = 2222

[toggle]
max_attempts = 9
"#,
        )
        .expect("parse");
        apply_raw_config(&mut cfg, raw);
        assert_eq!(cfg.appliance.host.as_deref(), Some("srp01"));
        assert_eq!(cfg.appliance.port, 2222);
        assert_eq!(cfg.appliance.user, "svadmin");
        assert_eq!(cfg.toggle.max_attempts, 9);
        assert_eq!(cfg.toggle.backoff_ms, 2_000);
        assert_eq!(cfg.vacuum.settle_ms, 500);
    }

    #[test]
    fn unknown_section_is_rejected() {
        assert!(toml::from_str::<RawConfig>("[nope]\nx = 1\n").is_err());
    }

    #[test]
    fn vacuum_options_carry_bounded_toggle() {
        let cfg = EffectiveConfig::default();
        let opts = cfg.vacuum_options();
        assert_eq!(opts.settle, Duration::from_millis(500));
        assert_eq!(opts.toggle.max_attempts, 5);
        assert_eq!(opts.toggle.backoff_max, Duration::from_secs(30));
    }

    #[test]
    fn ssh_options_require_host() {
        let cfg = EffectiveConfig::default();
        assert!(cfg.ssh_options().is_err());

        let mut cfg = EffectiveConfig::default();
        cfg.appliance.host = Some("srp01".to_string());
        let opts = cfg.ssh_options().expect("ssh options");
        assert_eq!(opts.host, "srp01");
        assert!(opts.prompt.is_match("svadmin@srp01> "));
    }

    #[test]
    fn expand_tilde_uses_home() {
        let home = Path::new("/home/op");
        assert_eq!(expand_tilde("~/logs", home), PathBuf::from("/home/op/logs"));
        assert_eq!(expand_tilde("/var/log/srpvac", home), PathBuf::from("/var/log/srpvac"));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("Yes").expect("bool"));
        assert!(!parse_bool(" off ").expect("bool"));
        assert!(parse_bool("maybe").is_err());
    }
}
