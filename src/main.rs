//! Quack VM - CLI Entry Point
//!
//! Commands:
//! - `quack-vm run <program.duck>` - Run a program until it halts
//! - `quack-vm disasm <program.duck>` - Disassemble a program
//! - `quack-vm debug <program.duck>` - Interactive debugger

use clap::{Parser, Subcommand};
use std::io::IsTerminal;

#[derive(Parser)]
#[command(name = "quack-vm")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the QuackQuack teaching computer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a .duck program until it halts
    Run {
        /// Path to the .duck file to execute
        program: String,
        /// Print PC, opcode, registers, ZF and SP before each step
        #[arg(short, long)]
        trace: bool,
        /// Scripted keyboard input, consumed one character per step
        /// in place of live input
        #[arg(short, long)]
        script: Option<String>,
        /// Maximum number of instructions to execute
        #[arg(short, long, default_value = "1000000")]
        max_cycles: u64,
        /// Write the final CPU state as JSON to this file
        #[arg(long)]
        dump_state: Option<String>,
    },
    /// Disassemble a .duck program to readable text
    Disasm {
        /// Path to the .duck file
        program: String,
    },
    /// Interactive debugger
    #[cfg(feature = "tui")]
    Debug {
        /// Path to the .duck file to debug
        program: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { program, trace, script, max_cycles, dump_state } => {
            run_program(&program, trace, script.as_deref(), max_cycles, dump_state.as_deref());
        }
        Commands::Disasm { program } => {
            disassemble_file(&program);
        }
        #[cfg(feature = "tui")]
        Commands::Debug { program } => {
            debug_program(&program);
        }
    }
}

fn run_program(
    path: &str,
    trace: bool,
    script: Option<&str>,
    max_cycles: u64,
    dump_state: Option<&str>,
) {
    use quack::{Cpu, IoDevice, load_duck};

    let program = match load_duck(path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("❌ Failed to load program: {}", e);
            std::process::exit(1);
        }
    };

    if program.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }

    // Scripted input wins; otherwise poll the terminal when attached to one.
    let live_input = script.is_none() && std::io::stdin().is_terminal();
    let io = match script {
        Some(s) => IoDevice::with_script(s),
        None if live_input => IoDevice::with_terminal(),
        None => IoDevice::new(),
    };

    let mut cpu = Cpu::with_io(io);
    if let Err(e) = cpu.load_program(&program.bytes) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    if live_input {
        if let Err(e) = crossterm::terminal::enable_raw_mode() {
            eprintln!("❌ Failed to enter raw mode: {}", e);
            std::process::exit(1);
        }
    }

    let result = drive(&mut cpu, trace, max_cycles);

    if live_input {
        let _ = crossterm::terminal::disable_raw_mode();
    }

    match result {
        Ok(executed) => {
            if cpu.is_running() {
                eprintln!();
                eprintln!(
                    "⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.",
                    executed
                );
            } else {
                println!();
                println!("HALT");
                println!("R0(final)=0x{:04X}", cpu.regs.r[0]);
            }
        }
        Err(e) => {
            eprintln!("❌ CPU error at PC=0x{:04X}: {}", cpu.regs.pc, e);
            std::process::exit(1);
        }
    }

    if let Some(state_path) = dump_state {
        if let Err(e) = dump_cpu_state(&cpu, state_path) {
            eprintln!("❌ Failed to dump state: {}", e);
            std::process::exit(1);
        }
        println!("✓ State written to {}", state_path);
    }

    if cpu.is_running() {
        std::process::exit(1);
    }
}

/// Step the CPU until halt, error, or the cycle limit.
fn drive(cpu: &mut quack::Cpu, trace: bool, max_cycles: u64) -> Result<u64, quack::CpuError> {
    let mut executed = 0u64;

    while cpu.is_running() && executed < max_cycles {
        if trace {
            trace_step(cpu);
        }
        cpu.step()?;
        cpu.check_pc()?;
        executed += 1;
    }

    Ok(executed)
}

/// Print the machine state about to execute, in one line on stderr.
fn trace_step(cpu: &quack::Cpu) {
    use quack::cpu::decode::{decode, RawInstr};

    let pc = cpu.regs.pc;
    let bytes = [
        cpu.mem.read8(pc).unwrap_or(0),
        cpu.mem.read8(pc.wrapping_add(1)).unwrap_or(0),
        cpu.mem.read8(pc.wrapping_add(2)).unwrap_or(0),
        cpu.mem.read8(pc.wrapping_add(3)).unwrap_or(0),
    ];
    let mnemonic = decode(RawInstr::from_bytes(bytes))
        .map(|i| i.to_string())
        .unwrap_or_else(|_| "??".into());

    eprintln!(
        "PC={:04X} OP={:02X} R0={:04X} R1={:04X} R2={:04X} R3={:04X} ZF={} SP={:04X}  {}",
        pc,
        bytes[0],
        cpu.regs.r[0],
        cpu.regs.r[1],
        cpu.regs.r[2],
        cpu.regs.r[3],
        cpu.regs.zf as u8,
        cpu.regs.sp,
        mnemonic,
    );
}

fn dump_cpu_state(cpu: &quack::Cpu, path: &str) -> Result<(), String> {
    let json = serde_json::to_string_pretty(cpu).map_err(|e| e.to_string())?;
    std::fs::write(path, json).map_err(|e| e.to_string())
}

fn disassemble_file(path: &str) {
    use quack::{disassemble, load_duck};

    let program = match load_duck(path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("❌ Failed to load program: {}", e);
            std::process::exit(1);
        }
    };

    println!("📖 {} ({} bytes)", path, program.len());
    println!();
    print!("{}", disassemble(&program.bytes));
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) {
    use quack::{load_duck, run_debugger};

    let program = match load_duck(path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("❌ Failed to load program: {}", e);
            std::process::exit(1);
        }
    };

    if program.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }

    if let Err(e) = run_debugger(program.bytes) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}
