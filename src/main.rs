//! Greenscreen CLI - drive, inspect, and explore 3270 hosts.
//!
//! This is the operational surface below the web layer: `screen` connects
//! and prints one decoded screen, `chaos` runs an exploration and exports
//! the recorded workflow, `replay` runs a workflow file back against its
//! host.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use greenscreen::chaos::{ChaosConfig, ChaosEngine, ChaosHint};
use greenscreen::driver::{EmulatorDriver, SubprocessPort, TerminalDriver};
use greenscreen::session::SessionRegistry;
use greenscreen::workflow::{run_workflow, StepType, Workflow};
use greenscreen::Config;

#[derive(Parser)]
#[command(name = "greenscreen", version, about = "3270 gateway core tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to a host and print the decoded screen.
    Screen {
        /// Target host name.
        #[arg(long)]
        host: String,
        /// Target port.
        #[arg(long)]
        port: Option<u16>,
        /// Emulator binary override.
        #[arg(long)]
        emulator: Option<PathBuf>,
    },
    /// Explore a host with synthesized input and export the workflow.
    Chaos {
        /// Target host name.
        #[arg(long)]
        host: String,
        /// Target port.
        #[arg(long)]
        port: Option<u16>,
        /// Iterations before stopping (0 = unlimited).
        #[arg(long, default_value_t = 100)]
        max_steps: u64,
        /// Wall-time budget in seconds (0 = unlimited).
        #[arg(long, default_value_t = 300)]
        time_budget: u64,
        /// PRNG seed (0 = derive from the wall clock).
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Milliseconds between iterations.
        #[arg(long, default_value_t = 500)]
        step_delay: u64,
        /// Where to write the exported workflow.
        #[arg(long)]
        output: Option<PathBuf>,
        /// JSON file of exploration hints.
        #[arg(long)]
        hints: Option<PathBuf>,
        /// Keep attempts that neither transitioned nor errored.
        #[arg(long)]
        include_no_progress: bool,
        /// Emulator binary override.
        #[arg(long)]
        emulator: Option<PathBuf>,
    },
    /// Replay a recorded workflow against its host.
    Replay {
        /// Workflow JSON file.
        file: PathBuf,
        /// Emulator binary override.
        #[arg(long)]
        emulator: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Screen {
            host,
            port,
            emulator,
        } => cmd_screen(&host, port, emulator),
        Command::Chaos {
            host,
            port,
            max_steps,
            time_budget,
            seed,
            step_delay,
            output,
            hints,
            include_no_progress,
            emulator,
        } => cmd_chaos(ChaosArgs {
            host,
            port,
            max_steps,
            time_budget,
            seed,
            step_delay,
            output,
            hints,
            include_no_progress,
            emulator,
        }),
        Command::Replay { file, emulator } => cmd_replay(&file, emulator),
    }
}

/// Build a subprocess-backed driver for one target.
fn build_driver(
    config: &Config,
    emulator: Option<PathBuf>,
    host: &str,
    port: u16,
) -> Arc<EmulatorDriver> {
    let exec = emulator.unwrap_or_else(|| config.emulator_path.clone());
    let args = config.emulator_invocation(host, port);
    let target = format!("{host}:{port}");
    Arc::new(EmulatorDriver::new(
        Box::new(SubprocessPort::new(exec, args)),
        target,
    ))
}

fn cmd_screen(host: &str, port: Option<u16>, emulator: Option<PathBuf>) -> Result<()> {
    let config = Config::load()?;
    let port = port.unwrap_or(config.default_port);
    let driver = build_driver(&config, emulator, host, port);

    driver.start().context("starting emulator")?;
    let screen = driver.update_screen().context("reading screen")?;
    driver.stop();

    println!("{}", screen.text());
    println!();
    println!(
        "{}x{} {} cursor ({}, {})",
        screen.width(),
        screen.height(),
        if screen.is_formatted() {
            "formatted"
        } else {
            "unformatted"
        },
        screen.cursor().1,
        screen.cursor().0,
    );
    for (i, field) in screen.fields().iter().enumerate() {
        println!(
            "field {i:3}  ({:2},{:2})-({:2},{:2})  {}{}{}{}",
            field.start_y,
            field.start_x,
            field.end_y,
            field.end_x,
            if field.is_protected() { "prot " } else { "input " },
            if field.is_numeric() { "num " } else { "" },
            if field.is_hidden() { "hidden " } else { "" },
            if field.focused { "focused" } else { "" },
        );
    }
    Ok(())
}

struct ChaosArgs {
    host: String,
    port: Option<u16>,
    max_steps: u64,
    time_budget: u64,
    seed: u64,
    step_delay: u64,
    output: Option<PathBuf>,
    hints: Option<PathBuf>,
    include_no_progress: bool,
    emulator: Option<PathBuf>,
}

fn cmd_chaos(args: ChaosArgs) -> Result<()> {
    let config = Config::load()?;
    let port = args.port.unwrap_or(config.default_port);
    let driver = build_driver(&config, args.emulator, &args.host, port);

    let hints: Vec<ChaosHint> = match &args.hints {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading hints from {}", path.display()))?;
            serde_json::from_str(&raw).context("parsing hints JSON")?
        }
        None => Vec::new(),
    };

    driver.start().context("starting emulator")?;

    // The registry owns the session for its lifetime, exactly as the web
    // layer would.
    let registry = SessionRegistry::new();
    let session = registry.create(
        Arc::clone(&driver) as Arc<dyn TerminalDriver>,
        args.host.clone(),
        port,
    );

    let chaos_config = ChaosConfig {
        max_steps: args.max_steps,
        time_budget: Duration::from_secs(args.time_budget),
        seed: args.seed,
        step_delay: Duration::from_millis(args.step_delay),
        output_file: args.output.clone(),
        exclude_no_progress_events: !args.include_no_progress,
        hints,
        ..ChaosConfig::default()
    };
    let engine = Arc::new(ChaosEngine::new(
        session.driver(),
        args.host.clone(),
        port,
        chaos_config,
    ));
    session.set_chaos(Some(Arc::clone(&engine)));

    engine.start()?;
    while engine.is_active() {
        std::thread::sleep(Duration::from_millis(250));
    }
    engine.wait();

    let stats = engine.stats();
    println!(
        "explored {} steps, {} screens, {} transitions, {} unique inputs",
        stats.steps_run, stats.screens_seen, stats.transitions, stats.unique_inputs
    );
    if let Some(err) = stats.last_error {
        println!("run ended with error: {err}");
    }
    match &args.output {
        None => println!("{}", engine.export().to_json()?),
        Some(path) => println!("workflow written to {}", path.display()),
    }

    registry.remove(&session.id);
    Ok(())
}

fn cmd_replay(file: &std::path::Path, emulator: Option<PathBuf>) -> Result<()> {
    let config = Config::load()?;
    let workflow = Workflow::load(file)?;
    let driver = build_driver(&config, emulator, &workflow.host, workflow.port);

    // Workflows recorded by the explorer carry no explicit Connect step.
    let explicit_connect = workflow
        .steps
        .first()
        .is_some_and(|s| s.step_type == StepType::Connect);
    if !explicit_connect {
        driver.start().context("starting emulator")?;
    }

    let result = run_workflow(&workflow, driver.as_ref());
    driver.stop();
    result?;
    println!("replayed {} steps against {}", workflow.steps.len(), workflow.host);
    Ok(())
}
