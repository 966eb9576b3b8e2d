use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{ArgGroup, Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config::EffectiveConfig;
use crate::core::{CommandSet, MaintenancePlan, Procedure, VacuumRun};
use crate::engine::{Engine, EngineOptions};
use crate::logs::RunRecord;
use crate::session::{Session, SshSession};
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "srpvac",
    version,
    about = "Checks the appliance database for transaction-id pressure and runs the vacuum it needs"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Per-command timeout in seconds (overrides appliance.command_timeout_secs)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
    #[arg(long, global = true)]
    pub dry_run: bool,
    #[arg(long, global = true)]
    pub host: Option<String>,
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the aggregate database status and transaction-id counters
    Status,
    /// Show or change the state of the appliance services
    Services(ServicesArgs),
    /// Pick and run the vacuum procedure the database needs
    Triage,
    /// Run a vacuum procedure directly
    Vacuum(VacuumArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ServicesArgs {
    #[command(subcommand)]
    pub command: Option<ServicesCommand>,
}

#[derive(Debug, Subcommand)]
pub enum ServicesCommand {
    /// Start the database and application server and wait until online
    Start,
    /// Stop the database and application server and wait until offline
    Stop,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("procedure").required(true).args(["short", "long"])))]
pub struct VacuumArgs {
    #[arg(long)]
    pub short: bool,
    #[arg(long)]
    pub long: bool,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let home_dir = home_dir()?;
    let env_config_path = std::env::var_os("SRPVAC_CONFIG").map(PathBuf::from);
    let mut cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;
    apply_cli_overrides(&mut cfg, &cli)?;

    let ui_cfg = UiConfig {
        color: std::io::stdout().is_terminal() && cfg.ui.color && !cli.no_color,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };
    let show_progress =
        std::io::stderr().is_terminal() && !cli.quiet && !cli.json && !cli.verbose;

    let engine = Engine::new(
        CommandSet::default(),
        EngineOptions {
            vacuum: cfg.vacuum_options(),
        },
    );
    let ctx = RunContext {
        cfg: &cfg,
        ui: &ui_cfg,
        home_dir: &home_dir,
        json: cli.json,
    };

    match cli.command {
        Commands::Status => {
            let mut session = open_session(&cfg)?;
            let status = engine
                .database_status(&mut session)
                .context("status query failed")?;
            session.disconnect();
            if cli.json {
                write_json(&status)?;
            } else {
                crate::ui::print_database_status(&status, &ui_cfg);
            }
        }
        Commands::Services(args) => match args.command {
            None => {
                let mut session = open_session(&cfg)?;
                let state = engine
                    .service_state(&mut session)
                    .context("service listing failed")?;
                session.disconnect();
                if cli.json {
                    write_json(&state)?;
                } else {
                    crate::ui::print_service_state(&state, &ui_cfg);
                }
            }
            Some(command) => {
                let online = matches!(command, ServicesCommand::Start);
                let label = if online { "services start" } else { "services stop" };
                if cli.dry_run {
                    let planned: Vec<String> =
                        crate::toggle::attempt_commands(engine.commands(), online)
                            .into_iter()
                            .map(str::to_string)
                            .collect();
                    crate::ui::print_planned_commands(label, &planned, &ui_cfg);
                    return Ok(());
                }
                let mut session = open_session(&cfg)?;
                let started_at = OffsetDateTime::now_utc();
                let result = with_spinner(show_progress, label, || {
                    engine.set_service_state(&mut session, online)
                });
                session.disconnect();
                ctx.record(
                    label,
                    started_at,
                    MaintenancePlan::None,
                    None,
                    None,
                    result.as_ref().err(),
                )?;
                let state = result.with_context(|| format!("{label} failed"))?;
                if cli.json {
                    write_json(&state)?;
                } else {
                    crate::ui::print_service_state(&state, &ui_cfg);
                }
            }
        },
        Commands::Triage => {
            let mut session = open_session(&cfg)?;
            if cli.dry_run {
                let (status, plan) = engine.plan(&mut session).context("triage failed")?;
                session.disconnect();
                if cli.json {
                    write_json(&DryRunTriage { status: &status, plan })?;
                    return Ok(());
                }
                crate::ui::print_database_status(&status, &ui_cfg);
                if !ui_cfg.quiet {
                    println!();
                    println!("plan: {}", crate::ui::plan_label(plan));
                }
                if let Some(procedure) = plan_procedure(plan) {
                    let planned = crate::vacuum::planned_commands(procedure, engine.commands());
                    crate::ui::print_planned_commands(
                        crate::ui::procedure_title(procedure),
                        &planned,
                        &ui_cfg,
                    );
                }
                return Ok(());
            }

            let started_at = OffsetDateTime::now_utc();
            let (status, plan) = engine.plan(&mut session).context("triage failed")?;
            let result = with_spinner(show_progress, crate::ui::plan_label(plan), || {
                engine.execute(&mut session, plan)
            });
            session.disconnect();
            if plan != MaintenancePlan::None {
                ctx.record(
                    "triage",
                    started_at,
                    plan,
                    Some(&status),
                    result.as_ref().ok().and_then(Option::as_ref),
                    result.as_ref().err(),
                )?;
            }
            let run = result.context("triage failed")?;
            let outcome = crate::core::TriageOutcome { status, plan, run };
            if cli.json {
                write_json(&outcome)?;
            } else {
                crate::ui::print_triage(&outcome, &ui_cfg);
            }
        }
        Commands::Vacuum(args) => {
            let procedure = if args.long {
                Procedure::Long
            } else {
                Procedure::Short
            };
            let title = crate::ui::procedure_title(procedure);
            if cli.dry_run {
                let planned = crate::vacuum::planned_commands(procedure, engine.commands());
                crate::ui::print_planned_commands(title, &planned, &ui_cfg);
                return Ok(());
            }
            let mut session = open_session(&cfg)?;
            let started_at = OffsetDateTime::now_utc();
            let result = with_spinner(show_progress, title, || match procedure {
                Procedure::Short => engine.short_vacuum(&mut session),
                Procedure::Long => engine.long_vacuum(&mut session),
            });
            session.disconnect();
            let plan = match procedure {
                Procedure::Short => MaintenancePlan::ShortVacuum,
                Procedure::Long => MaintenancePlan::LongVacuum,
            };
            ctx.record(
                "vacuum",
                started_at,
                plan,
                None,
                result.as_ref().ok(),
                result.as_ref().err(),
            )?;
            let run = result.with_context(|| format!("{title} failed"))?;
            if cli.json {
                write_json(&run)?;
            } else {
                crate::ui::print_run(&run, &ui_cfg);
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "srpvac", &mut out);
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    write_json(&cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: use `srpvac config --show`");
            }
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct DryRunTriage<'a> {
    status: &'a crate::core::DatabaseStatus,
    plan: MaintenancePlan,
}

struct RunContext<'a> {
    cfg: &'a EffectiveConfig,
    ui: &'a UiConfig,
    home_dir: &'a Path,
    json: bool,
}

impl RunContext<'_> {
    /// Writes the audit log for a finished run. A log failure after a failed
    /// run is only warned about so the run's own error is what surfaces.
    fn record(
        &self,
        command: &str,
        started_at: OffsetDateTime,
        plan: MaintenancePlan,
        status: Option<&crate::core::DatabaseStatus>,
        run: Option<&VacuumRun>,
        error: Option<&crate::error::MaintenanceError>,
    ) -> Result<()> {
        let host = self.cfg.appliance.host.clone().unwrap_or_default();
        let record = RunRecord {
            command,
            host: &host,
            started_at,
            finished_at: OffsetDateTime::now_utc(),
            plan,
            status,
            run,
            error: error.map(error_chain),
        };
        let logs_dir = self.cfg.logs_dir(self.home_dir);
        match crate::logs::write_run_log(&logs_dir, &record) {
            Ok(path) => {
                if !self.ui.quiet && !self.json {
                    eprintln!("log: {}", mask_home(&path, self.home_dir));
                }
                Ok(())
            }
            Err(err) if error.is_some() => {
                warn!(error = %err, "failed to write run log");
                Ok(())
            }
            Err(err) => Err(err.context(format!(
                "{command}: maintenance finished but the run log could not be written"
            ))),
        }
    }
}

fn error_chain(err: &crate::error::MaintenanceError) -> String {
    let mut msg = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

fn plan_procedure(plan: MaintenancePlan) -> Option<Procedure> {
    match plan {
        MaintenancePlan::None => None,
        MaintenancePlan::ShortVacuum => Some(Procedure::Short),
        MaintenancePlan::LongVacuum => Some(Procedure::Long),
    }
}

fn init_tracing(cli: &Cli) {
    let default = if cli.verbose {
        "srpvac=debug"
    } else if cli.quiet {
        "srpvac=error"
    } else {
        "srpvac=warn"
    };
    let filter = EnvFilter::try_from_env("SRPVAC_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("HOME is not set"))
}

fn apply_cli_overrides(cfg: &mut EffectiveConfig, cli: &Cli) -> Result<()> {
    if let Some(host) = &cli.host {
        cfg.appliance.host = Some(host.clone());
    }
    if let Some(user) = &cli.user {
        cfg.appliance.user = user.clone();
    }
    if let Some(timeout) = cli.timeout {
        if timeout == 0 {
            return Err(crate::exit::invalid_args("--timeout must be greater than 0"));
        }
        cfg.appliance.command_timeout_secs = timeout;
    }
    Ok(())
}

fn open_session(cfg: &EffectiveConfig) -> Result<SshSession> {
    let opts = cfg.ssh_options().map_err(crate::exit::invalid_args_err)?;
    let host = opts.host.clone();
    let mut session = SshSession::new(opts);
    session
        .connect(cfg.appliance.connect_retries)
        .map_err(|e| crate::exit::transport_err(anyhow::Error::from(e)))
        .with_context(|| format!("failed to connect to {host}"))?;
    Ok(session)
}

fn with_spinner<T>(enabled: bool, message: &str, f: impl FnOnce() -> T) -> T {
    if !enabled {
        return f();
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    pb.set_message(format!("{message}..."));
    pb.enable_steady_tick(Duration::from_millis(120));
    let out = f();
    pb.finish_and_clear();
    out
}

fn mask_home(path: &Path, home_dir: &Path) -> String {
    let Ok(stripped) = path.strip_prefix(home_dir) else {
        return path.display().to_string();
    };
    format!("~/{}", stripped.display())
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}
