//! Virtual drive verifier CLI - check that a mapped drive behaves exactly
//! like the directory behind it.
//!
//! Usage:
//!   vdrive-verify [options]
//!
//! Examples:
//!   vdrive-verify                                   # T: via subst (Windows)
//!   vdrive-verify --drive X:                        # another letter
//!   vdrive-verify --scenario metadata_parity -v     # one scenario, with logs
//!   vdrive-verify --drive /mnt/alias \
//!       --bind-command "ln -sn {target} {drive}" --unbind-command "rm -f {drive}"

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use log::{info, LevelFilter};

use vdrive_core::{suite, DriverConfig, MappingCommands, VirtualDrive, SCENARIOS};

/// Virtual drive equivalence verifier
#[derive(Parser, Debug)]
#[command(name = "vdrive-verify")]
#[command(about = "Verify a virtual drive mapping against its target directory")]
struct Args {
    /// Drive letter (T:) or mount path to bind
    #[arg(long)]
    drive: Option<String>,

    /// Bind command; {drive} and {target} are substituted
    #[arg(long, requires = "unbind_command")]
    bind_command: Option<String>,

    /// Unbind command; {drive} is substituted
    #[arg(long, requires = "bind_command")]
    unbind_command: Option<String>,

    /// Directory to create the temporary workspace in
    #[arg(long)]
    temp_root: Option<PathBuf>,

    /// Run only this scenario (repeatable)
    #[arg(long = "scenario", value_name = "NAME")]
    scenarios: Vec<String>,

    /// List scenario names and exit
    #[arg(long)]
    list: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    // RUST_LOG, when set, wins over -v.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn config(args: &Args) -> Result<DriverConfig, Box<dyn std::error::Error>> {
    let mut config = DriverConfig::default();
    if let Some(drive) = &args.drive {
        config.drive = VirtualDrive::parse(drive)?;
    }
    if let (Some(bind), Some(unbind)) = (&args.bind_command, &args.unbind_command) {
        config.commands = MappingCommands::from_templates(bind, unbind)?;
    }
    config.temp_root = args.temp_root.clone();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list {
        for scenario in SCENARIOS {
            println!("{}", scenario.name);
        }
        return Ok(());
    }

    let scenarios = if args.scenarios.is_empty() {
        SCENARIOS.to_vec()
    } else {
        suite::select(&args.scenarios)
            .map_err(|unknown| format!("Unknown scenario(s): {}", unknown.join(", ")))?
    };

    let config = config(&args)?;
    info!("Verifying {} with {} scenario(s)", config.drive, scenarios.len());
    let driver = config.build()?;

    let stop = Arc::new(AtomicBool::new(false));

    // Stop between scenarios on Ctrl-C; the driver still cleans up.
    let signal_stop = stop.clone();
    let signal_handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, finishing current scenario...");
            signal_stop.store(true, Ordering::SeqCst);
        }
    });

    let run_stop = stop.clone();
    let report = tokio::task::spawn_blocking(move || driver.run(&scenarios, &run_stop)).await?;
    signal_handle.abort();

    for name in &report.passed {
        info!("passed: {}", name);
    }
    for e in report.cleanup_errors.iter().skip(usize::from(report.failure.is_none())) {
        eprintln!("Cleanup error: {}", e.chain());
    }

    match report.first_error() {
        None => {
            println!("Tests succeeded");
            Ok(())
        }
        Some(e) => {
            println!("Tests failed: {}", e.chain());
            std::process::exit(1);
        }
    }
}
