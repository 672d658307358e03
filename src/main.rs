mod memory_map;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::{env, fs};

use tdmi_cpu::cpu::arm7tdmi::Arm7tdmi;
use tdmi_cpu::cpu::boot::BootConfig;
use tdmi_cpu::cpu::decode_table;
use tdmi_cpu::cpu::registers::register_name;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::memory_map::MemoryMap;

const DEFAULT_STEPS: u64 = 1_000_000;

const USAGE: &str = "usage: tdmi <binary> [--steps N] [--config FILE] [--log-file DIR]";

#[derive(Debug, PartialEq, Eq)]
struct Args {
    binary: PathBuf,
    steps: u64,
    config: Option<PathBuf>,
    log_dir: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, Box<dyn Error>> {
    let mut binary = None;
    let mut steps = DEFAULT_STEPS;
    let mut config = None;
    let mut log_dir = None;

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| format!("missing value for {flag}"))
        };

        match arg.as_str() {
            "--steps" => steps = value("--steps")?.parse()?,
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "--log-file" => log_dir = Some(PathBuf::from(value("--log-file")?)),
            flag if flag.starts_with("--") => return Err(format!("unknown flag {flag}").into()),
            _ if binary.is_none() => binary = Some(PathBuf::from(&arg)),
            _ => return Err(format!("unexpected argument {arg}").into()),
        }
    }

    Ok(Args {
        binary: binary.ok_or(USAGE)?,
        steps,
        config,
        log_dir,
    })
}

/// Installs the global subscriber. The returned guard flushes the file writer
/// when dropped, keep it alive until the end of `main`.
fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "tdmi.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

fn read_config(path: Option<&Path>) -> Result<BootConfig, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(BootConfig::default());
    };

    let text = fs::read_to_string(path)?;
    let config = serde_json::from_str(&text)?;
    tracing::info!("boot config from {}: {config:?}", path.display());

    Ok(config)
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = read_config(args.config.as_deref())?;
    let binary = fs::read(&args.binary)?;
    tracing::info!(
        "loading {} ({} bytes) at 0x{:08X}",
        args.binary.display(),
        binary.len(),
        config.entry_point
    );

    let mut memory = MemoryMap::new();
    memory.load(config.entry_point, &binary)?;

    decode_table::warm_up();
    let mut cpu = Arm7tdmi::with_config(memory, &config);

    let mut executed = 0;
    while executed < args.steps {
        let address = cpu.instruction_address();
        cpu.step();
        executed += 1;

        if cpu.instruction_address() == address {
            tracing::info!("branch to self at 0x{address:08X}, stopping");
            break;
        }
    }

    let (sequential, non_sequential, internal) = cpu.bus.access_counts();
    tracing::info!(
        "{executed} steps, {sequential} S / {non_sequential} N / {internal} I cycles"
    );
    tracing::info!(
        "CPSR {:08X} ({} mode, {:?})",
        u32::from(cpu.cpsr),
        cpu.cpsr.mode(),
        cpu.cpsr.cpu_state()
    );
    for (reg, value) in cpu.registers().iter().enumerate() {
        tracing::info!("{:>3} = 0x{value:08X}", register_name(reg));
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            return ExitCode::from(1);
        }
    };

    let _guard = init_logging(args.log_dir.as_deref());

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::from(2)
        }
    }
}
