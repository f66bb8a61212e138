use crate::config::Config;
use crate::executor::{Engine, LinkWarning, Program, Scope, StepRecord, Value};
use crate::runner::{RunOutcome, Runner};
use crate::services::{MockServiceHost, NullHost, ServiceHost};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "swodl")]
#[command(about = "SWODL - run workflow scripts one statement at a time", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a program, printing one JSON line per executed statement
    Run {
        /// Program AST as JSON
        program: PathBuf,

        /// Input variable as NAME=VALUE (VALUE is read as JSON, else as text)
        #[arg(short = 'i', long = "input")]
        inputs: Vec<String>,

        /// Pause before the statement on this line
        #[arg(short = 'b', long = "break")]
        breakpoints: Vec<u32>,

        /// TOML file with canned web service responses
        #[arg(long)]
        mock: Option<PathBuf>,

        /// Factor applied to every delay (0 skips delays)
        #[arg(long)]
        delay_multiplier: Option<f64>,

        /// Do not print step records
        #[arg(short = 'q', long)]
        quiet: bool,
    },

    /// Link a program and report its diagnostics
    Check {
        /// Program AST as JSON
        program: PathBuf,
    },
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let config_path = cli.config.map(PathBuf::from);

    match cli.command {
        Commands::Run {
            program,
            inputs,
            breakpoints,
            mock,
            delay_multiplier,
            quiet,
        } => {
            let config = Config::builder()
                .config_path(config_path)
                .delay_multiplier(delay_multiplier)
                .mock_path(mock)
                .build()
                .context("Failed to load configuration")?;
            crate::logging::init(&config.logging.filter);

            let program = load_program(&program)?;
            for warning in program.warnings() {
                eprintln!("warning: {}", warning);
            }

            let host: Arc<dyn ServiceHost> = match &config.services.mock_path {
                Some(path) => Arc::new(MockServiceHost::from_toml_file(path)?),
                None => Arc::new(NullHost),
            };
            let inputs = inputs
                .iter()
                .map(|raw| parse_input(raw))
                .collect::<Result<HashMap<_, _>>>()?;

            let engine = Engine::new(
                Arc::new(program),
                Scope::with_inputs(host, inputs),
                config.engine.options(),
            );
            let mut runner = Runner::new(engine).with_breakpoints(breakpoints);

            let token = runner.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    token.cancel();
                }
            });

            loop {
                let report = runner
                    .run(|record| {
                        if !quiet {
                            print_record(record);
                        }
                    })
                    .await;

                match report.outcome {
                    RunOutcome::Paused { line } => {
                        eprintln!("Paused before line {}", line);
                        print_variables(&runner);
                        wait_for_enter().await?;
                    }
                    RunOutcome::Suspended { line } => {
                        eprintln!("Suspended; resumes at line {}", line);
                        print_variables(&runner);
                        wait_for_enter().await?;
                    }
                    RunOutcome::Completed { status } => {
                        match status {
                            Some(status) => eprintln!("Completed with status {}", status.to_json()),
                            None => eprintln!("Completed"),
                        }
                        for warning in runner.engine().warnings() {
                            eprintln!("warning: {:?}", warning);
                        }
                        return Ok(());
                    }
                    RunOutcome::Failed { exception } => {
                        eprintln!("{}", exception);
                        std::process::exit(1);
                    }
                    RunOutcome::Cancelled => {
                        eprintln!("Run cancelled");
                        std::process::exit(130);
                    }
                }
            }
        }

        Commands::Check { program } => {
            let program = load_program(&program)?;

            println!("Version: {}", program.version_hash());
            if program.warnings().is_empty() {
                println!("✓ No diagnostics");
                return Ok(());
            }

            println!("Found {} diagnostic(s):\n", program.warnings().len());
            for warning in program.warnings() {
                println!("  {}", warning);
            }

            let fatal = program
                .warnings()
                .iter()
                .any(|w| matches!(w, LinkWarning::UndefinedLabel { .. }));
            if fatal {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn load_program(path: &Path) -> Result<Program> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read program {}", path.display()))?;
    Program::from_json(&source).with_context(|| format!("Failed to load program {}", path.display()))
}

/// `NAME=VALUE`; the value is JSON when it parses as JSON, text otherwise
fn parse_input(raw: &str) -> Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("Invalid input '{}': expected NAME=VALUE", raw))?;
    anyhow::ensure!(!name.is_empty(), "Invalid input '{}': empty name", raw);

    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(json) => Value::from_json(&json),
        Err(_) => Value::str(value),
    };
    Ok((name.to_string(), value))
}

fn print_record(record: &StepRecord) {
    let line = serde_json::json!({
        "line": record.line,
        "value": record.value.as_ref().map(Value::to_json),
        "next_line": record.next_line,
    });
    println!("{}", line);
}

fn print_variables(runner: &Runner) {
    for (name, value) in runner.engine().scope().variables() {
        eprintln!("  {} = {}", name, value.to_json());
    }
    eprintln!("Press Enter to continue");
}

async fn wait_for_enter() -> Result<()> {
    tokio::task::spawn_blocking(|| {
        let mut buf = String::new();
        std::io::stdin().read_line(&mut buf).map(|_| ())
    })
    .await
    .context("Input task failed")?
    .context("Failed to read from stdin")
}
