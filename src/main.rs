//! sim32 Emulator - CLI Entry Point
//!
//! Commands:
//! - `sim32-emu run <image>` - Run a flat image or assembly file
//! - `sim32-emu debug <image>` - Interactive debugger
//! - `sim32-emu asm <source>` - Assemble to a flat image
//! - `sim32-emu disasm <image>` - Disassemble a flat image

use clap::{ArgAction, Parser, Subcommand};
use sim32::asm::disasm::disassemble_instruction;
use sim32::{
    assemble, disassemble, load_image, save_image, AssemblerError, ConfigError, CpuError,
    ImageError, Machine, MachineConfig, MemoryError, RunOutcome, StdConsole,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Parser)]
#[command(name = "sim32-emu")]
#[command(version)]
#[command(about = "An instruction-set simulator for a small 32-bit register machine")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts or the step budget runs out
    Run {
        /// Flat image, or `.asm`/`.s` source to assemble first
        #[arg(value_parser = existing_file)]
        image: PathBuf,
        /// Maximum number of instructions to execute
        #[arg(long)]
        max_steps: Option<u64>,
        /// Address to load the image at and start from (hex with 0x, or decimal)
        #[arg(long, value_parser = parse_address)]
        load_address: Option<u32>,
        /// Memory size in bytes
        #[arg(long)]
        memory_size: Option<usize>,
        /// JSON machine configuration; flags override its values
        #[arg(long, value_parser = existing_file)]
        config: Option<PathBuf>,
        /// Print each executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Write the final machine state as JSON
        #[arg(long)]
        dump_json: Option<PathBuf>,
    },
    /// Interactive debugger
    #[cfg(feature = "tui")]
    Debug {
        /// Flat image, or `.asm`/`.s` source to assemble first
        #[arg(value_parser = existing_file)]
        image: PathBuf,
        /// Value to answer a READ_INT trap with; repeat for more
        #[arg(long = "input", allow_hyphen_values = true)]
        input: Vec<i32>,
        /// JSON machine configuration
        #[arg(long, value_parser = existing_file)]
        config: Option<PathBuf>,
    },
    /// Assemble source to a flat image
    Asm {
        /// Path to the source file
        #[arg(value_parser = existing_file)]
        source: PathBuf,
        /// Output image file (defaults to the source path with `.bin`)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Address the image will be loaded at
        #[arg(long, value_parser = parse_address)]
        origin: Option<u32>,
    },
    /// Disassemble a flat image to readable text
    Disasm {
        /// Path to the image file
        #[arg(value_parser = existing_file)]
        image: PathBuf,
        /// Address of the first word
        #[arg(long, value_parser = parse_address)]
        base: Option<u32>,
    },
}

/// Everything that can make a command fail.
#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("assembly error: {0}")]
    Assembler(#[from] AssemblerError),

    #[error("bad image: {0}")]
    Image(#[from] ImageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load program: {0}")]
    Load(#[from] MemoryError),

    #[error("machine fault: {0}")]
    Cpu(#[from] CpuError),

    #[error("failed to write state dump: {0}")]
    Dump(String),

    #[error("debugger error: {0}")]
    Debugger(std::io::Error),
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            image,
            max_steps,
            load_address,
            memory_size,
            config,
            trace,
            dump_json,
        } => {
            resolve_config(config.as_deref(), |c| {
                if let Some(max_steps) = max_steps {
                    c.max_steps = max_steps;
                }
                if let Some(load_address) = load_address {
                    c.load_address = load_address;
                }
                if let Some(memory_size) = memory_size {
                    c.memory_size = memory_size;
                }
            })
            .and_then(|config| run_program(&image, &config, trace, dump_json.as_deref()))
        }
        #[cfg(feature = "tui")]
        Commands::Debug { image, input, config } => {
            resolve_config(config.as_deref(), |_| {})
                .and_then(|config| debug_program(&image, config, input))
        }
        Commands::Asm { source, output, origin } => assemble_file(&source, output, origin),
        Commands::Disasm { image, base } => disassemble_file(&image, base),
    };

    if let Err(e) = result {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}

/// Install a stderr subscriber. `RUST_LOG` wins over `-v` when set.
fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_target(false)
        .without_time()
        .init();
}

fn existing_file(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("no such file: {}", s))
    }
}

fn parse_address(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

/// Start from the config file (or defaults), then apply command-line overrides.
fn resolve_config(
    path: Option<&Path>,
    apply_overrides: impl FnOnce(&mut MachineConfig),
) -> Result<MachineConfig, CliError> {
    let mut config = match path {
        Some(path) => MachineConfig::load(path)?,
        None => MachineConfig::default(),
    };
    apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

fn is_source(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("asm") | Some("s")
    )
}

/// Load a program: assemble source files, read anything else as a flat image.
fn load_program(path: &Path, load_address: u32) -> Result<Vec<u32>, CliError> {
    let words = if is_source(path) {
        let source = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let words = sim32::asm::assemble_at(&source, load_address)?;
        tracing::info!("assembled {} words from {}", words.len(), path.display());
        words
    } else {
        let words = load_image(path)?;
        tracing::info!("loaded {} words from {}", words.len(), path.display());
        words
    };
    Ok(words)
}

fn run_program(
    path: &Path,
    config: &MachineConfig,
    trace: bool,
    dump_json: Option<&Path>,
) -> Result<(), CliError> {
    let program = load_program(path, config.load_address)?;

    let mut machine = Machine::new(config.memory_size, StdConsole);
    machine.load_program(config.load_address, &program)?;
    tracing::info!(
        "running {} at {:#010x}, budget {} steps",
        path.display(),
        config.load_address,
        config.max_steps
    );

    let outcome = if trace {
        run_traced(&mut machine, config.max_steps)?
    } else {
        machine.run(config.max_steps)?
    };

    print_state(&machine, outcome);

    if let Some(dump_path) = dump_json {
        let json = serde_json::to_string_pretty(&machine.snapshot())
            .map_err(|e| CliError::Dump(e.to_string()))?;
        std::fs::write(dump_path, json).map_err(|e| CliError::Dump(e.to_string()))?;
        tracing::info!("wrote state to {}", dump_path.display());
    }

    Ok(())
}

/// Like [`Machine::run`], but prints each instruction before it executes.
fn run_traced(machine: &mut Machine<StdConsole>, max_steps: u64) -> Result<RunOutcome, CliError> {
    let mut executed = 0;
    while executed < max_steps && !machine.is_halted() {
        let pc = machine.pc();
        let raw = machine.mem.read::<u32>(pc).map_err(CpuError::from)?;
        println!("{:08x}: {}", pc, disassemble_instruction(raw));
        machine.step()?;
        executed += 1;
    }

    Ok(if machine.is_halted() {
        RunOutcome::Halted { steps: executed }
    } else {
        RunOutcome::StepLimit { steps: executed }
    })
}

fn print_state(machine: &Machine<StdConsole>, outcome: RunOutcome) {
    println!();
    println!("━━━ Result ━━━");
    println!("PC:    0x{:08x}", machine.pc());
    match outcome {
        RunOutcome::Halted { .. } => println!("State: Halted"),
        RunOutcome::StepLimit { .. } => println!("State: Step limit reached"),
    }
    println!("Steps: {}", outcome.steps());
    for (index, value) in machine.regs.non_zero() {
        println!("r{:<2} = 0x{:08x} ({})", index, value, value as i32);
    }

    if let RunOutcome::StepLimit { steps } = outcome {
        println!();
        println!("⚠️  Stopped after {} steps. Use --max-steps to increase.", steps);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &Path, config: MachineConfig, input: Vec<i32>) -> Result<(), CliError> {
    let program = load_program(path, config.load_address)?;
    sim32::run_debugger(program, config, input).map_err(CliError::Debugger)
}

fn assemble_file(
    source_path: &Path,
    output: Option<PathBuf>,
    origin: Option<u32>,
) -> Result<(), CliError> {
    let out_path = output.unwrap_or_else(|| source_path.with_extension("bin"));

    let source = std::fs::read_to_string(source_path).map_err(|source| CliError::Read {
        path: source_path.to_path_buf(),
        source,
    })?;

    let words = match origin {
        Some(origin) => sim32::asm::assemble_at(&source, origin)?,
        None => assemble(&source)?,
    };
    save_image(&out_path, &words)?;

    println!(
        "✓ Assembled {} words: {} → {}",
        words.len(),
        source_path.display(),
        out_path.display()
    );
    Ok(())
}

fn disassemble_file(path: &Path, base: Option<u32>) -> Result<(), CliError> {
    let words = load_image(path)?;
    let base = base.unwrap_or(sim32::asm::DEFAULT_LOAD_ADDRESS);
    println!("{}", disassemble(&words, base));
    Ok(())
}
