use clap::{Args, Parser, Subcommand};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use u_rotation::config::SolverConfig;
use u_rotation::editing::CommittedRoster;
use u_rotation::export;
use u_rotation::models::{ProblemInput, RotationProblem};
use u_rotation::solver::Solver;
use u_rotation::RotationError;

#[derive(Parser, Debug)]
#[command(
    name = "u-rotation",
    about = "Plan residency rotations and check hand edits from the command line",
    version
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve a rotation problem
    Solve(SolveArgs),
    /// Validate a proposed plan for one resident against the committed state
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
struct SolveArgs {
    /// Problem input (JSON)
    #[arg(long)]
    input: PathBuf,
    /// Solver configuration (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the solve outcome as JSON here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
    /// Also export the best plan as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Number of ranked solutions to keep (overrides the config)
    #[arg(long)]
    solutions: Option<usize>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Problem input (JSON); its current-year history is the committed state
    #[arg(long)]
    input: PathBuf,
    /// Resident to edit
    #[arg(long)]
    resident: String,
    /// Twelve comma-separated posting codes, empty or OFF for open blocks
    #[arg(long)]
    blocks: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let result = match cli.command {
        Command::Solve(args) => solve(args),
        Command::Validate(args) => validate(args),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_problem(path: &Path) -> Result<RotationProblem, RotationError> {
    let text = fs::read_to_string(path)?;
    RotationProblem::from_input(ProblemInput::from_json_str(&text)?)
}

fn solve(args: SolveArgs) -> Result<ExitCode, RotationError> {
    let problem = load_problem(&args.input)?;
    let mut config = match &args.config {
        Some(path) => SolverConfig::load(path)?,
        None => SolverConfig::default(),
    };
    if let Some(k) = args.solutions {
        config = config.with_solutions(k);
    }

    let outcome = Solver::new().with_config(config).solve(&problem)?;
    let json = serde_json::to_string_pretty(&outcome)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json)?;
            info!(path = %path.display(), "wrote solve outcome");
        }
        None => println!("{json}"),
    }

    if let Some(path) = &args.csv {
        let rows = export::rows(&problem, &outcome.output.plans);
        export::write_csv(File::create(path)?, &rows)?;
        info!(path = %path.display(), rows = rows.len(), "wrote CSV export");
    }

    Ok(ExitCode::SUCCESS)
}

fn validate(args: ValidateArgs) -> Result<ExitCode, RotationError> {
    let roster = CommittedRoster::new(load_problem(&args.input)?);
    let proposal: Vec<&str> = args.blocks.split(',').collect();
    let outcome = roster.validate(&args.resident, &proposal)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(if outcome.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
