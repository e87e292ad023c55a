use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use drill_core::format_clock;
use drill_core::model::{
    ExecutionRequest, LanguageId, ProblemCatalog, ProblemId, StaticCatalog, TargetDuration,
    Verdict,
};
use services::{AppServices, AppServicesError, CheckOutcome, CheckReport, SandboxConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    InvalidId { flag: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw:?}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- status  [--db <sqlite_url>] [--catalog <file>]");
    eprintln!("  cargo run -p app -- toggle  <problem-id> [--db ..] [--catalog ..]");
    eprintln!("  cargo run -p app -- target  <minutes> [--db ..]");
    eprintln!("  cargo run -p app -- timer   [--for <seconds>] [--db ..]");
    eprintln!("  cargo run -p app -- run     <file> [--lang <id>] [--problem <id>] [--expected <text>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://drill.sqlite3");
    eprintln!("  target minutes: 15, 25, 45 or 60");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  DRILL_DB_URL, DRILL_CATALOG, RUST_LOG");
    eprintln!("  DRILL_EXEC_TIMEOUT_MS, DRILL_EXEC_MAX_OPERATIONS");
    eprintln!("  DRILL_EXEC_MAX_OUTPUT_LINES, DRILL_EXEC_MAX_OUTPUT_BYTES");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Status,
    Toggle { problem: ProblemId },
    Target { minutes: u32 },
    Timer { run_for: Option<Duration> },
    Run(RunArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RunArgs {
    file: PathBuf,
    language: Option<LanguageId>,
    problem: Option<ProblemId>,
    expected: Option<String>,
}

struct Args {
    db_url: String,
    catalog: Option<PathBuf>,
    command: Command,
}

impl Args {
    fn parse(name: &str, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("DRILL_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://drill.sqlite3".into(), normalize_sqlite_url);
        let mut catalog = std::env::var("DRILL_CATALOG").ok().map(PathBuf::from);
        let mut positional: Option<String> = None;
        let mut run_for = None;
        let mut language = None;
        let mut problem = None;
        let mut expected = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--catalog" => catalog = Some(PathBuf::from(require_value(args, "--catalog")?)),
                "--for" => {
                    let value = require_value(args, "--for")?;
                    let secs: u64 = value.parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--for",
                        raw: value.clone(),
                    })?;
                    run_for = Some(Duration::from_secs(secs));
                }
                "--lang" => {
                    let value = require_value(args, "--lang")?;
                    language = Some(value.parse::<LanguageId>().map_err(|_| {
                        ArgsError::InvalidId {
                            flag: "--lang",
                            raw: value.clone(),
                        }
                    })?);
                }
                "--problem" => {
                    let value = require_value(args, "--problem")?;
                    problem = Some(value.parse::<ProblemId>().map_err(|_| {
                        ArgsError::InvalidId {
                            flag: "--problem",
                            raw: value.clone(),
                        }
                    })?);
                }
                "--expected" => expected = Some(require_value(args, "--expected")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") || positional.is_some() => {
                    return Err(ArgsError::UnknownArg(arg));
                }
                _ => positional = Some(arg),
            }
        }

        let command = match name {
            "status" => no_positional(positional, Command::Status)?,
            "timer" => no_positional(positional, Command::Timer { run_for })?,
            "toggle" => {
                let raw = positional.ok_or(ArgsError::MissingArgument { name: "problem-id" })?;
                let problem = raw
                    .parse::<ProblemId>()
                    .map_err(|_| ArgsError::InvalidId { flag: "<problem-id>", raw })?;
                Command::Toggle { problem }
            }
            "target" => {
                let raw = positional.ok_or(ArgsError::MissingArgument { name: "minutes" })?;
                let minutes = raw
                    .parse()
                    .map_err(|_| ArgsError::InvalidNumber { flag: "<minutes>", raw })?;
                Command::Target { minutes }
            }
            "run" => {
                let file = positional.ok_or(ArgsError::MissingArgument { name: "file" })?;
                Command::Run(RunArgs {
                    file: PathBuf::from(file),
                    language,
                    problem,
                    expected,
                })
            }
            other => return Err(ArgsError::UnknownArg(other.to_string())),
        };

        Ok(Self {
            db_url,
            catalog,
            command,
        })
    }
}

fn no_positional(positional: Option<String>, command: Command) -> Result<Command, ArgsError> {
    match positional {
        Some(extra) => Err(ArgsError::UnknownArg(extra)),
        None => Ok(command),
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn load_catalog(path: Option<&PathBuf>) -> Result<StaticCatalog, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(StaticCatalog::default());
    };
    let raw = std::fs::read_to_string(path)?;
    let catalog = StaticCatalog::from_json(&raw)?;
    tracing::info!(path = %path.display(), problems = catalog.total_problems(), "catalog loaded");
    Ok(catalog)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let name = match argv.next() {
        None => "status".to_string(),
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => first,
    };

    let parsed = Args::parse(&name, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let catalog = Arc::new(load_catalog(parsed.catalog.as_ref())?);
    let mut app = AppServices::new_sqlite(&parsed.db_url, catalog, SandboxConfig::from_env()).await?;

    match parsed.command {
        Command::Status => print_status(&app),
        Command::Toggle { problem } => {
            if app.catalog().problem(&problem).is_none() && app.catalog().total_problems() > 0 {
                tracing::warn!(%problem, "problem is not in the catalog");
            }
            let completed = app.ledger_mut().toggle(problem.clone());
            let state = if completed { "completed" } else { "not completed" };
            println!("{problem}: {state}");
            println!("overall: {}%", app.overall_progress());
        }
        Command::Target { minutes } => {
            let target = TargetDuration::from_minutes(minutes)?;
            app.timer().set_target_duration(target);
            println!("target: {} minutes", target.minutes());
        }
        Command::Timer { run_for } => run_timer(&app, run_for).await,
        Command::Run(args) => run_file(&app, args).await?,
    }

    app.flush().await;
    Ok(())
}

fn print_status(app: &AppServices) {
    let timer = app.timer();
    println!("total practice: {}", format_clock(timer.total_elapsed_seconds()));
    println!(
        "target: {} minutes ({} remaining)",
        timer.target().minutes(),
        format_clock(timer.remaining())
    );

    let catalog = app.catalog();
    for topic in catalog.topics() {
        let done = topic
            .problems
            .iter()
            .filter(|p| app.ledger().is_completed(&p.id))
            .count();
        println!(
            "{:<20} {:>3}%  ({done}/{})",
            topic.id.as_str(),
            app.topic_progress(&topic.id),
            topic.problems.len()
        );
    }
    println!("overall: {}%", app.overall_progress());

    let completed = app.ledger().completed().sorted_ids();
    if !completed.is_empty() {
        let ids: Vec<&str> = completed.iter().map(ProblemId::as_str).collect();
        println!("completed: {}", ids.join(", "));
    }
}

async fn run_timer(app: &AppServices, run_for: Option<Duration>) {
    let timer = app.timer();
    timer.reset();
    timer.start();
    tracing::info!(target_minutes = timer.target().minutes(), "timer running; ctrl-c to stop");

    let stop = async {
        match run_for {
            Some(limit) => tokio::time::sleep(limit).await,
            None => {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %err, "could not listen for ctrl-c");
                    std::future::pending::<()>().await;
                }
            }
        }
    };
    tokio::pin!(stop);

    let mut display = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            () = &mut stop => break,
            _ = display.tick() => {
                eprint!("\r{} left  ", format_clock(timer.remaining()));
                if timer.is_time_up() {
                    break;
                }
            }
        }
    }
    timer.pause();
    eprintln!();
    if timer.is_time_up() {
        println!("time is up");
    }
    println!(
        "session: {}  total: {}",
        format_clock(timer.session_elapsed_seconds()),
        format_clock(timer.total_elapsed_seconds())
    );
}

async fn run_file(app: &AppServices, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(&args.file)?;
    let request = run_request(app, args, source)?;

    match app.code_check().check(request).await {
        CheckOutcome::Completed(report) => print_report(&report),
        CheckOutcome::Discarded => eprintln!("run was superseded"),
    }
    Ok(())
}

/// A `--problem` supplies language and expectation; `--lang` and `--expected`
/// override them individually.
fn run_request(
    app: &AppServices,
    args: RunArgs,
    source: String,
) -> Result<ExecutionRequest, AppServicesError> {
    let mut request = match &args.problem {
        Some(problem) => app.problem_request(problem, source, args.language)?,
        None => ExecutionRequest::new(source, args.language.unwrap_or_else(LanguageId::rhai)),
    };
    if let Some(expected) = args.expected {
        request.expected_output = Some(expected);
    }
    Ok(request)
}

fn print_report(report: &CheckReport) {
    if report.is_simulated() {
        println!("(simulated: this language has no local interpreter, code was not run)");
    }
    if !report.result.captured_output.is_empty() {
        println!("{}", report.result.captured_output);
    }
    if let Some(message) = report.result.error_message() {
        println!("error: {message}");
    }
    let verdict = match report.verdict {
        Verdict::Pass => "pass",
        Verdict::Fail => "fail",
        Verdict::NoExpectation => "no expected output",
    };
    println!(
        "verdict: {verdict}  [{} in {} ms]",
        report.result.backend.label(),
        report.result.elapsed.as_millis()
    );
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
