//! swtel binary.
//!
//! Entry point for the `swtel` switch telemetry agent.

use std::process::ExitCode;

use clap::Parser;
use swtel_agent::exit::{codes, exit_code};
use swtel_agent::{
    execute_resolve, execute_run, init_logging, Cli, Command, CommandError, RealSleeper,
    ResolveArgs, RunArgs, ShutdownFlag, Verbosity,
};
use swtel_clock::SystemClock;
use swtel_fs::RealFilesystem;
use swtel_snmp::UdpSession;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(Verbosity::from_count(cli.verbose));

    let result = match cli.command {
        Command::Run(args) => run_run(args),
        Command::Resolve(args) => run_resolve(args),
    };

    match result {
        Ok(()) => ExitCode::from(codes::SUCCESS as u8),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(exit_code(&e) as u8)
        }
    }
}

/// Run the agent until SIGINT or SIGTERM.
fn run_run(args: RunArgs) -> Result<(), CommandError> {
    args.validate()?;
    let identity = args.switch.identity()?;
    let session = UdpSession::connect(&args.switch.session_config(&identity.target))?;

    // Set up shutdown handler for graceful termination on SIGINT/SIGTERM
    let shutdown = ShutdownFlag::new();
    let fs = RealFilesystem;
    let clock = SystemClock;
    let sleeper = RealSleeper::new();

    let result = execute_run(&args, session, &fs, &clock, &sleeper, &shutdown)?;

    println!(
        "Sampled {} cycles ({} failed), wrote {} archives",
        result.summary.sampler.cycles,
        result.summary.sampler.failed,
        result.summary.flusher.archives + result.summary.final_flush.map_or(0, |f| f.written.len() as u64)
    );

    Ok(())
}

/// Resolve and print the polled interfaces.
fn run_resolve(args: ResolveArgs) -> Result<(), CommandError> {
    args.validate()?;
    let identity = args.switch.identity()?;
    let session = UdpSession::connect(&args.switch.session_config(&identity.target))?;

    let result = execute_resolve(&args, &session)?;

    println!("Switch: {}", result.identity.target);
    println!("Machine: {}", result.identity.machine);
    for binding in result.interfaces.iter() {
        println!(
            "  {:<8} ifIndex={} ifDescr={} ifAlias={}",
            binding.role, binding.index, binding.description, binding.alias
        );
    }

    Ok(())
}
