//! Debugger application state and logic.

use crate::cpu::{Cpu, IoDevice};
use crate::cpu::decode::{decode, RawInstr};
use std::collections::HashSet;

/// How many instructions a single "run" keypress executes per UI frame.
const RUN_CHUNK: u64 = 256;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original program for reset.
    pub program: Vec<u8>,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<u16>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// When set, typed characters are fed to the VM keyboard instead of
    /// the debugger.
    pub input_mode: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset (in rows).
    pub mem_scroll: usize,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<u8>) -> Self {
        let mut cpu = Cpu::with_io(IoDevice::new().buffered());
        let _ = cpu.load_program(&program);

        Self {
            cpu,
            program,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            input_mode: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            mem_scroll: 0,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU halted after {} cycles", self.cpu.cycles);
            self.running = false;
            return;
        }

        let pc = self.cpu.regs.pc;
        match self.cpu.step().and_then(|i| self.cpu.check_pc().map(|_| i)) {
            Ok(Some(instr)) => {
                self.status = format!("PC=0x{:04X}: {}", pc, instr);
            }
            Ok(None) => {}
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Start continuous execution.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one UI frame's worth of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        for _ in 0..RUN_CHUNK {
            if !self.cpu.is_running() {
                self.running = false;
                self.status = format!("Halted after {} cycles", self.cpu.cycles);
                return;
            }

            self.step();
            if !self.running {
                return;
            }

            // Break when execution lands on a breakpoint, so resuming from
            // one does not immediately re-trigger it.
            if self.breakpoints.contains(&self.cpu.regs.pc) {
                self.running = false;
                self.status = format!("Breakpoint at PC=0x{:04X}", self.cpu.regs.pc);
                return;
            }
        }
    }

    /// Toggle a breakpoint at the current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.regs.pc;
        if self.breakpoints.contains(&pc) {
            self.breakpoints.remove(&pc);
            self.status = format!("Removed breakpoint at PC=0x{:04X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC=0x{:04X}", pc);
        }
    }

    /// Feed a typed character to the VM keyboard.
    pub fn feed_key(&mut self, c: char) {
        if c.is_ascii() {
            self.cpu.io.inject_key(c as u8);
            self.status = format!("Key '{}' sent to VM", c.to_ascii_uppercase());
        }
    }

    /// Reset CPU to initial state with the program reloaded.
    pub fn reset(&mut self) {
        self.cpu = Cpu::with_io(IoDevice::new().buffered());
        let _ = self.cpu.load_program(&self.program);
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Disassembly rows around the current PC: (addr, text, is_current).
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u16, String, bool)> {
        let pc = self.cpu.regs.pc;
        let half = (lines as u16 / 2) * 4;
        let start = pc.saturating_sub(half) & !3;

        (0..lines as u16)
            .filter_map(|i| {
                let addr = start.checked_add(i * 4)?;
                let bytes = [
                    self.cpu.mem.read8(addr).ok()?,
                    self.cpu.mem.read8(addr + 1).ok()?,
                    self.cpu.mem.read8(addr + 2).ok()?,
                    self.cpu.mem.read8(addr + 3).ok()?,
                ];
                let text = match decode(RawInstr::from_bytes(bytes)) {
                    Ok(instr) => instr.to_string(),
                    Err(_) => format!(
                        ".byte 0x{:02X}, 0x{:02X}, 0x{:02X}, 0x{:02X}",
                        bytes[0], bytes[1], bytes[2], bytes[3]
                    ),
                };
                Some((addr, text, addr == pc))
            })
            .collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u8>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(program);

    // Main loop
    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if app.input_mode {
                        match key.code {
                            KeyCode::Esc => {
                                app.input_mode = false;
                                app.status = "Input mode off.".into();
                            }
                            KeyCode::Char(c) => app.feed_key(c),
                            _ => {}
                        }
                    } else {
                        match key.code {
                            KeyCode::Char('q') => app.should_quit = true,
                            KeyCode::Char('s') => {
                                app.running = false;
                                app.step();
                            }
                            KeyCode::Char('r') => app.run(),
                            KeyCode::Char('p') => {
                                app.running = false;
                                app.status = "Paused.".into();
                            }
                            KeyCode::Char('b') => app.toggle_breakpoint(),
                            KeyCode::Char('x') => app.reset(),
                            KeyCode::Char('i') => {
                                app.input_mode = true;
                                app.status = "Input mode: keys go to the VM. Esc to leave.".into();
                            }
                            KeyCode::Up => {
                                if app.mem_scroll > 0 {
                                    app.mem_scroll -= 1;
                                }
                            }
                            KeyCode::Down => {
                                app.mem_scroll += 1;
                            }
                            _ => {}
                        }
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
