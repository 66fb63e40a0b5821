//! Procwarden CLI - run one command under supervision
//! Exit code mirrors the child (124 on timeout, 130 on interrupt, 1 on other failures)

mod hooks;
mod report;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use procwarden_core::config::{KillMode, SupervisorConfig};
use procwarden_core::domain::SpawnRequest;
use procwarden_core::{InterruptHandle, ProcessHooks, Session, SupervisorError};
use procwarden_infra_system::ProcessLauncher;

use hooks::EchoHooks;
use report::RunReport;

const EXIT_FAILURE: u8 = 1;
const EXIT_TIMEOUT: u8 = 124;
const EXIT_INTERRUPTED: u8 = 130;
const DEFAULT_LOG_FILTER: &str = "procwarden=info";
const MIN_JOIN_TIMEOUT: Duration = Duration::from_millis(1);

#[derive(Parser)]
#[command(name = "procwarden")]
#[command(about = "Run external processes under supervision", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format (pretty or json)
    #[arg(long, env = "PROCWARDEN_LOG_FORMAT", default_value = "pretty", global = true)]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command and wait for it
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Kill the command after this many milliseconds (0 = no limit)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Send SIGTERM first and SIGKILL after this many milliseconds
    #[arg(long)]
    kill_grace_ms: Option<u64>,

    /// Set an environment variable (KEY=VALUE), repeatable
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Remove an inherited environment variable, repeatable
    #[arg(long = "unset", value_name = "KEY")]
    unset: Vec<String>,

    /// Working directory of the command
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Forward our stdin to the command before waiting for it
    #[arg(long)]
    forward_stdin: bool,

    /// Print a JSON report instead of echoing output
    #[arg(long)]
    json: bool,

    /// Command and arguments
    #[arg(last = true, required = true)]
    command: Vec<String>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_format)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let exit = match cli.command {
        Commands::Run(args) => runtime.block_on(run(args)),
    };

    // An abandoned stdin read stays parked on a blocking thread until EOF
    runtime.shutdown_background();
    exit
}

fn init_logging(log_format: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .context("Failed to create env filter")?;

    // Logs go to stderr; stdout belongs to the child's output
    match log_format {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
    }

    Ok(())
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let config = build_config(&args)?;
    let request = build_request(&args);
    let launcher = ProcessLauncher::new(config.clone());

    let started = Instant::now();
    let mut session = launcher
        .spawn(EchoHooks::new(!args.json), request)
        .with_context(|| format!("Failed to start {:?}", args.command))?;

    info!(
        name = %session.name(),
        pid = ?session.pid(),
        timeout_ms = config.default_timeout.as_millis() as u64,
        "Supervising process"
    );

    let interrupt = session.interrupt_handle();
    let on_ctrl_c = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping process");
            on_ctrl_c.interrupt();
        }
    });

    // The timeout covers stdin forwarding as well as the wait
    let deadline = (!config.default_timeout.is_zero())
        .then(|| tokio::time::Instant::now() + config.default_timeout);

    if args.forward_stdin {
        let stdin = BufReader::new(tokio::io::stdin());
        let end = forward_lines(&mut session, stdin, &interrupt, deadline).await?;
        debug!(end = ?end, "Stopped forwarding stdin");
    }
    if let Err(e) = session.send_eof().await {
        debug!(error = %e, "Closing stdin failed");
    }

    let result = session.join_timeout(remaining_timeout(deadline)).await;
    let elapsed = started.elapsed();

    if args.json {
        let report = build_report(&args.command, &session, &result, elapsed);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Err(e) = &result {
        eprintln!("{} {}", "procwarden:".red().bold(), e);
    }

    Ok(ExitCode::from(exit_byte(&result)))
}

fn build_config(args: &RunArgs) -> Result<SupervisorConfig> {
    let mut config = SupervisorConfig::from_env().context("Invalid PROCWARDEN_* environment")?;

    if let Some(ms) = args.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = args.kill_grace_ms {
        config = config.with_kill_mode(KillMode::Terminate {
            grace: Duration::from_millis(ms),
        });
    }

    Ok(config)
}

fn build_request(args: &RunArgs) -> SpawnRequest {
    let mut request = SpawnRequest::new(args.command.iter().cloned());

    for key in &args.unset {
        request = request.env_remove(key.clone());
    }
    for (key, value) in &args.env {
        request = request.env(key.clone(), value.clone());
    }
    if let Some(dir) = &args.cwd {
        request = request.working_dir(dir.clone());
    }

    request
}

/// Why stdin forwarding stopped
#[derive(Debug, PartialEq, Eq)]
enum ForwardEnd {
    Eof,
    ChildClosedStdin,
    Interrupted,
    DeadlineReached,
}

/// Copy `reader` to the child line by line
///
/// Stops at EOF, when the child stops reading, when the interrupt handle
/// fires, or at `deadline`, whichever comes first.
async fn forward_lines<H, R>(
    session: &mut Session<H>,
    reader: R,
    interrupt: &InterruptHandle,
    deadline: Option<tokio::time::Instant>,
) -> Result<ForwardEnd>
where
    H: ProcessHooks,
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let deadline_reached = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline_reached);

    loop {
        let line = tokio::select! {
            biased;
            () = interrupt.interrupted() => return Ok(ForwardEnd::Interrupted),
            () = &mut deadline_reached => return Ok(ForwardEnd::DeadlineReached),
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };
        let Some(line) = line else {
            return Ok(ForwardEnd::Eof);
        };

        let written = tokio::select! {
            biased;
            () = interrupt.interrupted() => return Ok(ForwardEnd::Interrupted),
            () = &mut deadline_reached => return Ok(ForwardEnd::DeadlineReached),
            written = session.println(&line) => written,
        };

        match written {
            Ok(()) => {}
            // Child stopped reading; keep going to join and report its exit
            Err(SupervisorError::Io(e)) => {
                debug!(error = %e, "Child closed its stdin");
                return Ok(ForwardEnd::ChildClosedStdin);
            }
            Err(e) => bail!("Failed to write to child stdin: {e}"),
        }
    }
}

/// Join timeout left before `deadline`; zero means no limit
fn remaining_timeout(deadline: Option<tokio::time::Instant>) -> Duration {
    match deadline {
        // Never hand out zero for a real deadline: zero disables the limit
        Some(deadline) => deadline
            .saturating_duration_since(tokio::time::Instant::now())
            .max(MIN_JOIN_TIMEOUT),
        None => Duration::ZERO,
    }
}

fn build_report<H: ProcessHooks>(
    command: &[String],
    session: &Session<H>,
    result: &procwarden_core::Result<i32, H::Error>,
    elapsed: Duration,
) -> RunReport {
    let (exit_code, failure, error) = match result {
        Ok(code) => (Some(*code), None, None),
        Err(e) => (None, Some(failure_kind(e)), Some(e.to_string())),
    };

    RunReport {
        command: command.to_vec(),
        pid: session.pid(),
        exit_code,
        failure,
        error,
        elapsed_ms: elapsed.as_millis() as u64,
        stdout: session.output().map(<[String]>::to_vec).unwrap_or_default(),
        stderr: session.error_output().map(<[String]>::to_vec).unwrap_or_default(),
    }
}

fn failure_kind<E>(err: &SupervisorError<E>) -> &'static str {
    match err {
        SupervisorError::Timeout(_) => "timeout",
        SupervisorError::Interrupted => "interrupted",
        _ => "error",
    }
}

/// Process exit status for a join result
fn exit_byte<E>(result: &procwarden_core::Result<i32, E>) -> u8 {
    match result {
        Ok(code) => u8::try_from(*code).unwrap_or(EXIT_FAILURE),
        Err(SupervisorError::Timeout(_)) => EXIT_TIMEOUT,
        Err(SupervisorError::Interrupted) => EXIT_INTERRUPTED,
        Err(_) => EXIT_FAILURE,
    }
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}
