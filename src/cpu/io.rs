//! Memory-mapped I/O devices: keyboard and screen/clock.
//!
//! The device owns a monotonic tick counter and an at-most-one-deep
//! pending-key buffer. It is advanced exactly once per CPU step, before
//! fetch. Keys come from a scripted character sequence (deterministic) or
//! from non-blocking live terminal polling; at most one key is consumed
//! per tick and a buffered key is never overwritten.
//!
//! Register map (inside the I/O window):
//! - `IO_KEY`: read returns the buffered key and clears the available flag
//! - `IO_STATUS`: read returns 1 if a key is buffered, else 0
//! - `IO_PUTCHAR`: write emits the byte to the screen
//! - `IO_CLEAR`: write emits a terminal-clear sequence
//! - `IO_TICK`: read returns the low 8 bits of the tick counter

use crate::cpu::memory::{IO_START, IO_END};
use serde::{Serialize, Deserialize};
use std::io::Write;
use std::time::Duration;

/// Keyboard data register: reading consumes the pending key.
pub const IO_KEY: u16 = 0x0BE0;
/// Keyboard status register: 1 if a key is pending, else 0.
pub const IO_STATUS: u16 = 0x0BE1;
/// Screen data register: writing prints one character.
pub const IO_PUTCHAR: u16 = 0x0BE2;
/// Screen control register: writing clears the terminal.
pub const IO_CLEAR: u16 = 0x0BE3;
/// Clock register: low 8 bits of the tick counter.
pub const IO_TICK: u16 = 0x0BE4;

/// ANSI clear-screen-and-home sequence emitted by `IO_CLEAR`.
const CLEAR_SEQUENCE: &[u8] = b"\x1b[2J\x1b[H";

/// Is `addr` inside the memory-mapped I/O window?
pub fn is_io_addr(addr: u16) -> bool {
    (IO_START..=IO_END).contains(&addr)
}

/// Where keyboard input comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSource {
    /// No input; the key buffer never fills on its own.
    None,
    /// A predetermined character sequence, consumed one key per tick.
    Script { keys: Vec<u8>, cursor: usize },
    /// Non-blocking live terminal polling (requires raw mode).
    Terminal,
}

/// Where screen output goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Screen {
    /// Write characters straight to stdout, flushing each one.
    Stdout,
    /// Collect characters in memory (tests and the debugger UI).
    Buffer(Vec<u8>),
}

/// The keyboard/screen/clock device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoDevice {
    ticks: u32,
    key: u8,
    key_available: bool,
    input: InputSource,
    screen: Screen,
}

impl IoDevice {
    /// Create a device with no input source, writing to stdout.
    pub fn new() -> Self {
        Self {
            ticks: 0,
            key: 0,
            key_available: false,
            input: InputSource::None,
            screen: Screen::Stdout,
        }
    }

    /// Create a device fed by a scripted key sequence.
    pub fn with_script(script: &str) -> Self {
        Self {
            input: InputSource::Script {
                keys: script.bytes().collect(),
                cursor: 0,
            },
            ..Self::new()
        }
    }

    /// Create a device polling the live terminal.
    pub fn with_terminal() -> Self {
        Self {
            input: InputSource::Terminal,
            ..Self::new()
        }
    }

    /// Redirect screen output into an in-memory buffer.
    pub fn buffered(mut self) -> Self {
        self.screen = Screen::Buffer(Vec::new());
        self
    }

    /// Reset tick counter and key buffer; the input source rewinds.
    pub fn reset(&mut self) {
        self.ticks = 0;
        self.key = 0;
        self.key_available = false;
        if let InputSource::Script { cursor, .. } = &mut self.input {
            *cursor = 0;
        }
    }

    /// Total ticks since reset.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Is a key currently buffered?
    pub fn key_pending(&self) -> bool {
        self.key_available
    }

    /// Everything written to a buffered screen so far.
    pub fn screen_contents(&self) -> &[u8] {
        match &self.screen {
            Screen::Buffer(buf) => buf,
            Screen::Stdout => &[],
        }
    }

    /// Force a key into the buffer, as if typed. Overwrites any pending key.
    pub fn inject_key(&mut self, key: u8) {
        self.key = key.to_ascii_uppercase();
        self.key_available = true;
    }

    /// Advance the device by one tick.
    ///
    /// Increments the counter, then tries to fill the key buffer if it is
    /// empty: scripted input consumes the next character; live input polls
    /// the terminal without blocking, consuming at most one event and
    /// discarding bare newline/carriage-return.
    pub fn tick(&mut self) -> std::io::Result<()> {
        self.ticks = self.ticks.wrapping_add(1);

        if self.key_available {
            return Ok(());
        }

        match &mut self.input {
            InputSource::None => {}
            InputSource::Script { keys, cursor } => {
                if let Some(&c) = keys.get(*cursor) {
                    self.key = c.to_ascii_uppercase();
                    self.key_available = true;
                    *cursor += 1;
                }
            }
            InputSource::Terminal => {
                if let Some(c) = poll_terminal_key()? {
                    self.key = c.to_ascii_uppercase();
                    self.key_available = true;
                }
            }
        }

        Ok(())
    }

    /// Memory-mapped read of an I/O-window address.
    ///
    /// Reading `IO_KEY` is one-shot: it clears the available flag. Every
    /// other read is non-destructive. Unmapped window addresses read 0.
    pub fn read(&mut self, addr: u16) -> u8 {
        match addr {
            IO_KEY => {
                self.key_available = false;
                self.key
            }
            IO_STATUS => self.key_available as u8,
            IO_TICK => (self.ticks & 0xFF) as u8,
            _ => 0,
        }
    }

    /// Memory-mapped write to an I/O-window address.
    ///
    /// Unmapped window addresses are no-ops; only window membership is
    /// checked, never bounds.
    pub fn write(&mut self, addr: u16, value: u8) -> std::io::Result<()> {
        match addr {
            IO_PUTCHAR => self.emit(&[value]),
            IO_CLEAR => self.clear_screen(),
            _ => Ok(()),
        }
    }

    fn emit(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match &mut self.screen {
            Screen::Stdout => {
                let mut out = std::io::stdout();
                out.write_all(bytes)?;
                out.flush()
            }
            Screen::Buffer(buf) => {
                buf.extend_from_slice(bytes);
                Ok(())
            }
        }
    }

    fn clear_screen(&mut self) -> std::io::Result<()> {
        match &mut self.screen {
            Screen::Stdout => {
                let mut out = std::io::stdout();
                out.write_all(CLEAR_SEQUENCE)?;
                out.flush()
            }
            Screen::Buffer(buf) => {
                buf.clear();
                Ok(())
            }
        }
    }
}

impl Default for IoDevice {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll the terminal for one key press without blocking.
///
/// Returns `None` when no input is ready or the pending event is not a
/// printable ASCII key (Enter and control keys are dropped).
fn poll_terminal_key() -> std::io::Result<Option<u8>> {
    use crossterm::event::{self, Event, KeyCode, KeyEventKind};

    if !event::poll(Duration::ZERO)? {
        return Ok(None);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind == KeyEventKind::Press {
            if let KeyCode::Char(c) = key.code {
                if c.is_ascii() && c != '\n' && c != '\r' {
                    return Ok(Some(c as u8));
                }
            }
        }
    }

    Ok(None)
}
