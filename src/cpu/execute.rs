//! CPU execution engine for the Quack machine.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.
//! Each decoded instruction is handled by exactly one match arm; there is
//! no shared fallthrough between cases.

use crate::cpu::{Memory, Registers, IoDevice};
use crate::cpu::decode::{self, Instruction, RawInstr, DecodeError};
use crate::cpu::io;
use crate::cpu::memory::MemoryError;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Fetching and executing instructions.
    Running,
    /// A halt instruction was executed. Terminal.
    Halted,
}

/// What an executed instruction does to the program counter.
enum Flow {
    /// Advance past the 4-byte instruction.
    Next,
    /// Transfer control to an absolute address.
    Jump(u16),
    /// Stop the machine; PC stays on the halt instruction.
    Halt,
}

/// The Quack CPU: registers, memory, and the memory-mapped I/O device,
/// owned together for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Keyboard/screen/clock device.
    pub io: IoDevice,
    /// Current execution state.
    pub state: CpuState,
    /// Instructions executed since reset.
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a CPU with zeroed memory and no input source.
    pub fn new() -> Self {
        Self::with_io(IoDevice::new())
    }

    /// Create a CPU wired to a specific I/O device.
    pub fn with_io(io: IoDevice) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            io,
            state: CpuState::Running,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Reset registers, flags, device, and cycle count. Memory is left
    /// alone so a loaded program can be re-run.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.io.reset();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Zero memory and load a program image at address 0.
    pub fn load_program(&mut self, image: &[u8]) -> Result<(), MemoryError> {
        self.mem.clear();
        self.mem.load_program(image)
    }

    /// Execute a single instruction.
    ///
    /// Returns the executed instruction, or `None` if the CPU is halted
    /// (a halted step is a no-op).
    pub fn step(&mut self) -> Result<Option<Instruction>, CpuError> {
        if self.state != CpuState::Running {
            return Ok(None);
        }

        self.io.tick()?;

        let raw = self.fetch()?;
        let instr = decode::decode(raw)?;

        match self.execute(instr)? {
            Flow::Next => self.regs.advance_pc(),
            Flow::Jump(target) => self.regs.jump(target),
            Flow::Halt => self.state = CpuState::Halted,
        }

        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(Some(instr))
    }

    /// Run until halt or error.
    ///
    /// A program counter that leaves memory without the CPU halting is an
    /// error, not a silent stop. Returns the number of instructions
    /// executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        self.run_limited(u64::MAX)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
            self.check_pc()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Fail if the program counter escaped memory without a halt.
    pub fn check_pc(&self) -> Result<(), CpuError> {
        if self.state == CpuState::Running && self.regs.pc as usize >= self.mem.size() {
            return Err(CpuError::PcOutOfBounds { pc: self.regs.pc });
        }
        Ok(())
    }

    /// Fetch the 4 instruction bytes at the program counter.
    fn fetch(&self) -> Result<RawInstr, CpuError> {
        let pc = self.regs.pc;
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let addr = pc
                .checked_add(i as u16)
                .ok_or(MemoryError::OutOfBounds { addr: pc })?;
            *byte = self.mem.read8(addr)?;
        }
        Ok(RawInstr::from_bytes(bytes))
    }

    /// Execute a decoded instruction and report its control-flow effect.
    fn execute(&mut self, instr: Instruction) -> Result<Flow, CpuError> {
        match instr {
            // ==================== Data Movement ====================

            Instruction::Rrmovw { src, dst } => {
                let value = self.regs.get(src);
                self.regs.set_with_flags(dst, value);
            }

            Instruction::Irmovb { dst, imm } => {
                self.regs.set_with_flags(dst, imm as u16);
            }

            Instruction::Irmovw { dst, imm } => {
                self.regs.set_with_flags(dst, imm);
            }

            Instruction::Mrmovw { dst, addr } => {
                let value = self.load16(addr)?;
                self.regs.set(dst, value);
            }

            Instruction::Rmmovw { src, addr } => {
                self.store16(addr, self.regs.get(src))?;
            }

            Instruction::Mrmovb { dst, addr } => {
                let value = self.load8(addr)?;
                self.regs.set(dst, value as u16);
            }

            Instruction::Rmmovb { src, addr } => {
                self.store8(addr, self.regs.get(src) as u8)?;
            }

            Instruction::Mrmovbr { dst, base } => {
                let addr = self.regs.get(base);
                let value = self.load8(addr)?;
                self.regs.set(dst, value as u16);
            }

            Instruction::Rmmovbr { src, base } => {
                let addr = self.regs.get(base);
                self.store8(addr, self.regs.get(src) as u8)?;
            }

            // ==================== ALU ====================

            Instruction::Addw { src, dst } => {
                let result = self.regs.get(dst).wrapping_add(self.regs.get(src));
                self.regs.set_with_flags(dst, result);
            }

            Instruction::Subw { src, dst } => {
                let result = self.regs.get(dst).wrapping_sub(self.regs.get(src));
                self.regs.set_with_flags(dst, result);
            }

            Instruction::Cmpw { a, b } => {
                self.regs.zf = self.regs.get(a) == self.regs.get(b);
            }

            // ==================== Control Flow ====================

            Instruction::Jmp { target } => return Ok(Flow::Jump(target)),

            Instruction::Je { target } => {
                if self.regs.zf {
                    return Ok(Flow::Jump(target));
                }
            }

            Instruction::Jne { target } => {
                if !self.regs.zf {
                    return Ok(Flow::Jump(target));
                }
            }

            Instruction::Halt => return Ok(Flow::Halt),

            // ==================== Stack / Procedures ====================

            Instruction::Pushw { src } => {
                self.regs.sp = self.regs.sp.wrapping_sub(2);
                self.store16(self.regs.sp, self.regs.get(src))?;
            }

            Instruction::Popw { dst } => {
                let value = self.load16(self.regs.sp)?;
                self.regs.set(dst, value);
                self.regs.sp = self.regs.sp.wrapping_add(2);
                self.regs.zf = false;
            }

            Instruction::Call { target } => {
                let ret_addr = self.regs.pc.wrapping_add(4);
                let slot = self.regs.sp.wrapping_sub(2);
                self.store16(slot, ret_addr)?;
                self.regs.sp = slot;
                return Ok(Flow::Jump(target));
            }

            Instruction::Ret => {
                let target = self.load16(self.regs.sp)?;
                self.regs.sp = self.regs.sp.wrapping_add(2);
                return Ok(Flow::Jump(target));
            }
        }

        Ok(Flow::Next)
    }

    // Data accesses route through these helpers so the I/O window is
    // intercepted before the backing array is touched.

    fn load8(&mut self, addr: u16) -> Result<u8, CpuError> {
        if io::is_io_addr(addr) {
            Ok(self.io.read(addr))
        } else {
            Ok(self.mem.read8(addr)?)
        }
    }

    fn store8(&mut self, addr: u16, value: u8) -> Result<(), CpuError> {
        if io::is_io_addr(addr) {
            self.io.write(addr, value)?;
            Ok(())
        } else {
            Ok(self.mem.write8(addr, value)?)
        }
    }

    /// 16-bit load. A word overlapping the I/O window is serviced as two
    /// byte reads so device registers see the same one-shot semantics
    /// either way.
    fn load16(&mut self, addr: u16) -> Result<u16, CpuError> {
        let hi_addr = addr.wrapping_add(1);
        if io::is_io_addr(addr) || io::is_io_addr(hi_addr) {
            let lo = self.load8(addr)?;
            let hi = self.load8(hi_addr)?;
            Ok(u16::from_le_bytes([lo, hi]))
        } else {
            Ok(self.mem.read16(addr)?)
        }
    }

    fn store16(&mut self, addr: u16, value: u16) -> Result<(), CpuError> {
        let hi_addr = addr.wrapping_add(1);
        if io::is_io_addr(addr) || io::is_io_addr(hi_addr) {
            let [lo, hi] = value.to_le_bytes();
            self.store8(addr, lo)?;
            self.store8(hi_addr, hi)
        } else {
            Ok(self.mem.write16(addr, value)?)
        }
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU has halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is still running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during CPU execution. All are fatal to the run.
#[derive(Debug, Error)]
pub enum CpuError {
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("I/O device error: {0}")]
    Io(#[from] std::io::Error),

    #[error("program counter escaped memory at 0x{pc:04X} without a halt")]
    PcOutOfBounds { pc: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode;
    use crate::cpu::io::{IoDevice, IO_KEY, IO_STATUS, IO_PUTCHAR};
    use crate::cpu::memory::{MEM_SIZE, SP_INIT, DATA_START};
    use crate::cpu::registers::Reg;
    use proptest::prelude::*;

    fn reg(i: u8) -> Reg {
        Reg::new(i).unwrap()
    }

    fn image(instrs: &[Instruction]) -> Vec<u8> {
        instrs.iter().flat_map(encode).collect()
    }

    fn run_program(instrs: &[Instruction]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_program(&image(instrs)).unwrap();
        cpu.run().unwrap();
        cpu
    }

    #[test]
    fn test_halt_only_program() {
        let mut cpu = Cpu::new();
        cpu.load_program(&image(&[Instruction::Halt])).unwrap();

        let executed = cpu.run().unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
        // Halt leaves the PC on the halt instruction itself.
        assert_eq!(cpu.regs.pc, 0);
        assert_eq!(cpu.regs.r, [0; 4]);
        assert_eq!(cpu.regs.sp, SP_INIT);
    }

    #[test]
    fn test_step_after_halt_is_noop() {
        let mut cpu = Cpu::new();
        cpu.load_program(&image(&[Instruction::Halt])).unwrap();
        cpu.run().unwrap();

        assert_eq!(cpu.step().unwrap(), None);
        assert_eq!(cpu.cycles, 1);
    }

    #[test]
    fn test_immediate_moves_set_zero_flag() {
        let cpu = run_program(&[
            Instruction::Irmovw { dst: reg(0), imm: 0x1234 },
            Instruction::Irmovb { dst: reg(1), imm: 0xFF },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.r[0], 0x1234);
        // irmovb zero-extends.
        assert_eq!(cpu.regs.r[1], 0x00FF);
        assert!(!cpu.regs.zf);

        let cpu = run_program(&[
            Instruction::Irmovw { dst: reg(0), imm: 0 },
            Instruction::Halt,
        ]);
        assert!(cpu.regs.zf);
    }

    #[test]
    fn test_register_move_targets_b2_operand() {
        let cpu = run_program(&[
            Instruction::Irmovw { dst: reg(1), imm: 7 },
            Instruction::Rrmovw { src: reg(1), dst: reg(3) },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.r[3], 7);
        assert_eq!(cpu.regs.r[1], 7);
    }

    #[test]
    fn test_add_wraps_and_sets_zero_flag() {
        let cpu = run_program(&[
            Instruction::Irmovw { dst: reg(0), imm: 0xFFFF },
            Instruction::Irmovw { dst: reg(1), imm: 1 },
            Instruction::Addw { src: reg(1), dst: reg(0) },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.r[0], 0);
        assert!(cpu.regs.zf);
    }

    #[test]
    fn test_sub_clears_zero_flag_on_nonzero() {
        let cpu = run_program(&[
            Instruction::Irmovw { dst: reg(0), imm: 5 },
            Instruction::Irmovw { dst: reg(1), imm: 3 },
            Instruction::Subw { src: reg(1), dst: reg(0) },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.r[0], 2);
        assert!(!cpu.regs.zf);
    }

    #[test]
    fn test_compare_leaves_registers() {
        let cpu = run_program(&[
            Instruction::Irmovw { dst: reg(0), imm: 9 },
            Instruction::Irmovw { dst: reg(1), imm: 9 },
            Instruction::Cmpw { a: reg(0), b: reg(1) },
            Instruction::Halt,
        ]);

        assert!(cpu.regs.zf);
        assert_eq!(cpu.regs.r[0], 9);
        assert_eq!(cpu.regs.r[1], 9);
    }

    #[test]
    fn test_word_store_load_roundtrip() {
        let cpu = run_program(&[
            Instruction::Irmovw { dst: reg(0), imm: 0xCAFE },
            Instruction::Rmmovw { src: reg(0), addr: DATA_START },
            Instruction::Mrmovw { dst: reg(2), addr: DATA_START },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.r[2], 0xCAFE);
    }

    #[test]
    fn test_byte_store_load_zero_extends() {
        let cpu = run_program(&[
            Instruction::Irmovw { dst: reg(0), imm: 0xABCD },
            // Only the low byte is stored.
            Instruction::Rmmovb { src: reg(0), addr: DATA_START },
            Instruction::Irmovw { dst: reg(1), imm: 0xFFFF },
            Instruction::Mrmovb { dst: reg(1), addr: DATA_START },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.r[1], 0x00CD);
    }

    #[test]
    fn test_byte_access_through_register_address() {
        let cpu = run_program(&[
            Instruction::Irmovw { dst: reg(0), imm: 0x42 },
            Instruction::Irmovw { dst: reg(1), imm: DATA_START },
            Instruction::Rmmovbr { src: reg(0), base: reg(1) },
            Instruction::Mrmovbr { dst: reg(2), base: reg(1) },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.r[2], 0x42);
    }

    #[test]
    fn test_loads_leave_zero_flag_alone() {
        let cpu = run_program(&[
            // Set ZF, then load a non-zero value; ZF must survive.
            Instruction::Irmovw { dst: reg(0), imm: 0x55 },
            Instruction::Rmmovw { src: reg(0), addr: DATA_START },
            Instruction::Irmovw { dst: reg(1), imm: 0 },
            Instruction::Mrmovw { dst: reg(2), addr: DATA_START },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.r[2], 0x55);
        assert!(cpu.regs.zf);
    }

    #[test]
    fn test_push_pop_roundtrip() {
        let cpu = run_program(&[
            Instruction::Irmovw { dst: reg(0), imm: 0xBEEF },
            Instruction::Pushw { src: reg(0) },
            Instruction::Popw { dst: reg(3) },
            Instruction::Halt,
        ]);

        assert_eq!(cpu.regs.r[3], 0xBEEF);
        assert_eq!(cpu.regs.sp, SP_INIT);
    }

    #[test]
    fn test_push_touches_only_stack_state() {
        // A push must decrement SP, write the slot, and nothing else:
        // no register, flag, or control-flow side effects.
        let mut cpu = Cpu::new();
        cpu.load_program(&image(&[
            Instruction::Irmovw { dst: reg(0), imm: 0x1111 },
            Instruction::Pushw { src: reg(0) },
            Instruction::Halt,
        ]))
        .unwrap();

        cpu.step().unwrap();
        let zf_before = cpu.regs.zf;
        let regs_before = cpu.regs.r;
        let pc_before = cpu.regs.pc;

        cpu.step().unwrap();

        assert_eq!(cpu.regs.sp, SP_INIT - 2);
        assert_eq!(cpu.mem.read16(SP_INIT - 2).unwrap(), 0x1111);
        assert_eq!(cpu.regs.zf, zf_before);
        assert_eq!(cpu.regs.r, regs_before);
        assert_eq!(cpu.regs.pc, pc_before + 4);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_pop_clears_zero_flag() {
        let cpu = run_program(&[
            Instruction::Irmovw { dst: reg(0), imm: 0 }, // sets ZF
            Instruction::Pushw { src: reg(0) },
            Instruction::Popw { dst: reg(1) },
            Instruction::Halt,
        ]);

        assert!(!cpu.regs.zf);
    }

    #[test]
    fn test_call_ret_roundtrip() {
        // 0x0000: call 0x000C
        // 0x0004: irmovw R1, 1      (runs after ret)
        // 0x0008: halt
        // 0x000C: irmovw R2, 2
        // 0x0010: ret
        let cpu = run_program(&[
            Instruction::Call { target: 0x000C },
            Instruction::Irmovw { dst: reg(1), imm: 1 },
            Instruction::Halt,
            Instruction::Irmovw { dst: reg(2), imm: 2 },
            Instruction::Ret,
        ]);

        assert_eq!(cpu.regs.r[1], 1);
        assert_eq!(cpu.regs.r[2], 2);
        assert_eq!(cpu.regs.sp, SP_INIT);
        assert_eq!(cpu.regs.pc, 0x0008);
    }

    #[test]
    fn test_conditional_jumps() {
        // je taken when ZF set
        let cpu = run_program(&[
            Instruction::Irmovw { dst: reg(0), imm: 0 },
            Instruction::Je { target: 0x000C },
            Instruction::Irmovw { dst: reg(1), imm: 0xDEAD },
            Instruction::Halt,
        ]);
        assert_eq!(cpu.regs.r[1], 0);

        // jne falls through when ZF set
        let cpu = run_program(&[
            Instruction::Irmovw { dst: reg(0), imm: 0 },
            Instruction::Jne { target: 0x000C },
            Instruction::Irmovw { dst: reg(1), imm: 0x7777 },
            Instruction::Halt,
        ]);
        assert_eq!(cpu.regs.r[1], 0x7777);
    }

    #[test]
    fn test_loop_sums_one_to_ten() {
        // R0 = accumulator, R1 = counter, R2 = constant 1, R3 = limit 11
        let cpu = run_program(&[
            Instruction::Irmovw { dst: reg(0), imm: 0 },      // 0x00
            Instruction::Irmovw { dst: reg(1), imm: 1 },      // 0x04
            Instruction::Irmovw { dst: reg(2), imm: 1 },      // 0x08
            Instruction::Irmovw { dst: reg(3), imm: 11 },     // 0x0C
            Instruction::Cmpw { a: reg(1), b: reg(3) },       // 0x10
            Instruction::Je { target: 0x0024 },               // 0x14
            Instruction::Addw { src: reg(1), dst: reg(0) },   // 0x18
            Instruction::Addw { src: reg(2), dst: reg(1) },   // 0x1C
            Instruction::Jmp { target: 0x0010 },              // 0x20
            Instruction::Halt,                                // 0x24
        ]);

        assert_eq!(cpu.regs.r[0], 55);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_word_load_at_last_address_is_fatal() {
        let mut cpu = Cpu::new();
        cpu.load_program(&image(&[Instruction::Mrmovw {
            dst: reg(0),
            addr: (MEM_SIZE - 1) as u16,
        }]))
        .unwrap();

        let err = cpu.run().unwrap_err();
        assert!(matches!(
            err,
            CpuError::Memory(MemoryError::OutOfBounds { addr }) if addr == (MEM_SIZE - 1) as u16
        ));
    }

    #[test]
    fn test_unknown_opcode_is_fatal() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0xEE, 0, 0, 0]).unwrap();

        let err = cpu.run().unwrap_err();
        assert!(matches!(err, CpuError::Decode(DecodeError::InvalidOpcode(0xEE))));
    }

    #[test]
    fn test_invalid_register_operand_is_fatal() {
        let mut cpu = Cpu::new();
        // pushw with ra = 7
        cpu.load_program(&[0x30, 7, 0, 0]).unwrap();

        let err = cpu.run().unwrap_err();
        assert!(matches!(err, CpuError::Decode(DecodeError::InvalidRegister(7))));
    }

    #[test]
    fn test_pc_escape_is_fatal() {
        let mut cpu = Cpu::new();
        cpu.load_program(&image(&[Instruction::Jmp { target: MEM_SIZE as u16 }]))
            .unwrap();

        let err = cpu.run().unwrap_err();
        assert!(matches!(err, CpuError::PcOutOfBounds { pc } if pc == MEM_SIZE as u16));
    }

    #[test]
    fn test_putchar_writes_program_output() {
        let mut cpu = Cpu::with_io(IoDevice::new().buffered());
        cpu.load_program(&image(&[
            Instruction::Irmovb { dst: reg(0), imm: b'H' },
            Instruction::Rmmovb { src: reg(0), addr: IO_PUTCHAR },
            Instruction::Irmovb { dst: reg(0), imm: b'I' },
            Instruction::Rmmovb { src: reg(0), addr: IO_PUTCHAR },
            Instruction::Halt,
        ]))
        .unwrap();

        cpu.run().unwrap();
        assert_eq!(cpu.io.screen_contents(), b"HI");
    }

    #[test]
    fn test_scripted_keyboard_via_memory_map() {
        let mut cpu = Cpu::with_io(IoDevice::with_script("AB").buffered());
        cpu.load_program(&image(&[
            Instruction::Mrmovb { dst: reg(0), addr: IO_STATUS }, // 1
            Instruction::Mrmovb { dst: reg(1), addr: IO_KEY },    // 'A'
            Instruction::Mrmovb { dst: reg(2), addr: IO_KEY },    // 'B'
            Instruction::Mrmovb { dst: reg(3), addr: IO_STATUS }, // drained: 0
            Instruction::Halt,
        ]))
        .unwrap();

        cpu.run().unwrap();
        assert_eq!(cpu.regs.r[0], 1);
        assert_eq!(cpu.regs.r[1], b'A' as u16);
        assert_eq!(cpu.regs.r[2], b'B' as u16);
        assert_eq!(cpu.regs.r[3], 0);
    }

    #[test]
    fn test_io_reads_do_not_touch_backing_memory() {
        let mut cpu = Cpu::with_io(IoDevice::with_script("Z").buffered());
        cpu.load_program(&image(&[
            Instruction::Mrmovb { dst: reg(0), addr: IO_KEY },
            Instruction::Rmmovb { src: reg(0), addr: IO_KEY + 8 },
            Instruction::Halt,
        ]))
        .unwrap();

        cpu.run().unwrap();
        // The device intercepted both accesses; the array behind the
        // window stays zero.
        assert_eq!(cpu.mem.read8(IO_KEY).unwrap(), 0);
        assert_eq!(cpu.mem.read8(IO_KEY + 8).unwrap(), 0);
        assert_eq!(cpu.regs.r[0], b'Z' as u16);
    }

    #[test]
    fn test_reset_preserves_memory() {
        let mut cpu = Cpu::new();
        cpu.load_program(&image(&[
            Instruction::Irmovw { dst: reg(0), imm: 3 },
            Instruction::Halt,
        ]))
        .unwrap();
        cpu.run().unwrap();
        assert_eq!(cpu.regs.r[0], 3);

        cpu.reset();
        assert_eq!(cpu.regs.r[0], 0);
        assert_eq!(cpu.cycles, 0);

        // Same program still in memory; runs again.
        cpu.run().unwrap();
        assert_eq!(cpu.regs.r[0], 3);
    }

    proptest! {
        #[test]
        fn prop_irmovw_stores_value_and_flags(v: u16) {
            let cpu = run_program(&[
                Instruction::Irmovw { dst: reg(2), imm: v },
                Instruction::Halt,
            ]);
            prop_assert_eq!(cpu.regs.r[2], v);
            prop_assert_eq!(cpu.regs.zf, v == 0);
        }

        #[test]
        fn prop_addw_wraps_mod_2_16(a: u16, b: u16) {
            let cpu = run_program(&[
                Instruction::Irmovw { dst: reg(0), imm: a },
                Instruction::Irmovw { dst: reg(1), imm: b },
                Instruction::Addw { src: reg(1), dst: reg(0) },
                Instruction::Halt,
            ]);
            prop_assert_eq!(cpu.regs.r[0], a.wrapping_add(b));
            prop_assert_eq!(cpu.regs.zf, a.wrapping_add(b) == 0);
        }

        #[test]
        fn prop_push_pop_restores_sp(v: u16) {
            let cpu = run_program(&[
                Instruction::Irmovw { dst: reg(0), imm: v },
                Instruction::Pushw { src: reg(0) },
                Instruction::Popw { dst: reg(1) },
                Instruction::Halt,
            ]);
            prop_assert_eq!(cpu.regs.r[1], v);
            prop_assert_eq!(cpu.regs.sp, SP_INIT);
        }
    }
}
