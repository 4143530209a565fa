//! lazybind CLI - run deferred-binding scenarios

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;

use lazybind::scenario::{self, Scenario, ScenarioReport};
use lazybind::{EngineConfig, FixSuggestion, ScenarioError};

#[derive(Parser)]
#[command(name = "lazybind")]
#[command(about = "lazybind - deferred name binding scenario runner")]
#[command(version)]
struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file, or every *.yaml / *.yml under a directory
    Run {
        /// Scenario file or directory
        path: PathBuf,

        /// Print the audit trail as JSON
        #[arg(long)]
        events: bool,
    },

    /// Validate a scenario file (parse and check names only)
    Validate {
        /// Path to scenario file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let result = match cli.command {
        Commands::Run { path, events } => run_scenarios(&path, events),
        Commands::Validate { file } => validate_scenario(&file),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e
            .downcast_ref::<ScenarioError>()
            .and_then(|err| err.fix_suggestion())
        {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn run_scenarios(path: &Path, print_events: bool) -> anyhow::Result<()> {
    let files = scenario::discover(path);
    if files.is_empty() {
        anyhow::bail!("No scenario files found under '{}'", path.display());
    }

    // A single file surfaces its own error (and fix) directly
    if let [file] = files.as_slice() {
        let report = run_one(file)?;
        print_report(&report, print_events)?;
        return Ok(());
    }

    let mut failed = 0;
    for file in &files {
        match run_one(file) {
            Ok(report) => print_report(&report, print_events)?,
            Err(err) => {
                failed += 1;
                eprintln!("{} {}: {}", "✗".red(), file.display(), err);
                if let Some(suggestion) = err.fix_suggestion() {
                    eprintln!("  {} {}", "Fix:".yellow(), suggestion);
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} scenario(s) failed", failed, files.len());
    }
    println!("{} {} scenario(s) passed", "✓".green(), files.len());
    Ok(())
}

fn run_one(file: &Path) -> Result<ScenarioReport, ScenarioError> {
    let mut scenario = Scenario::load(file)?;

    // Environment switches override the file
    let env = EngineConfig::from_env();
    scenario.config.disabled |= env.disabled;
    scenario.config.no_warn |= env.no_warn;

    println!(
        "{} Running scenario: {}",
        "→".cyan(),
        scenario.display_name().cyan().bold()
    );
    scenario::run(&scenario)
}

fn print_report(report: &ScenarioReport, print_events: bool) -> anyhow::Result<()> {
    for line in &report.lines {
        println!("  {}", line);
    }
    println!(
        "{} Scenario '{}' passed ({} events)",
        "✓".green(),
        report.name,
        report.events.len()
    );
    println!("  Bindings: {}", report.bindings);

    if print_events {
        let json = serde_json::to_string_pretty(&report.events)
            .context("failed to serialize events")?;
        println!("{}", json);
    }
    Ok(())
}

fn validate_scenario(file: &Path) -> anyhow::Result<()> {
    let scenario = Scenario::load(file)?;
    let steps = scenario.validate()?;

    println!("{} Scenario '{}' is valid", "✓".green(), file.display());
    println!("  Modules: {}", scenario.modules.len());
    println!("  Steps: {}", steps);
    Ok(())
}
