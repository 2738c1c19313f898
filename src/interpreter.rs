//! # interpreter
//!
//! The CHIP-8 machine as a program sees it:
//!  - V0..VF     16 8-bit registers; VF doubles as carry/borrow/collision flag
//!  - I          16-bit pointer for sprite, BCD and register dump/load access
//!  - PC         address of the next instruction; programs start at 0x200
//!  - stack      up to 16 return addresses
//!  - timers     delay and sound, counting down at 60Hz
//!  - display    64x32 monochrome, XOR drawn
//!  - keypad     16 hex keys
//!
//! `step()` runs exactly one instruction; `tick()` runs the 60Hz timers. The
//! host decides how to interleave them. Waiting for a key is a state, not a
//! loop: `step()` returns straight away until a fresh key press shows up.

use crate::config::MachineConfig;
use crate::error::MachineError;
use crate::framebuffer::Framebuffer;
use crate::input::{InputLatch, KeyState};
use crate::instruction::Instruction;
use crate::memory::{self, MemoryBus, MemoryMap};
use crate::registers::RegisterFile;
use crate::stack::CallStack;
use crate::timer::TimerClock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io;

/// Execution state of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Running,
    /// FX0A is waiting; the key goes into this register
    WaitingForKey { register: u8 },
    /// a fatal error happened; only a reset or new program gets out of here
    Halted,
}

/// What the host should do after a `step()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    Continue,
    /// the framebuffer changed and should be rendered
    Redraw,
    /// blocked on FX0A; keep rendering and ticking timers
    AwaitingKey,
}

/// An opcode the machine didn't recognise, and where it was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownOpcode {
    pub opcode: u16,
    pub pc: u16,
}

/// where the program counter goes after an instruction
enum Flow {
    Next,
    Skip,
    Jump(u16),
}

impl Flow {
    fn skip_if(condition: bool) -> Flow {
        if condition {
            Flow::Skip
        } else {
            Flow::Next
        }
    }
}

pub struct Chip8Interpreter {
    memory: MemoryBus,
    registers: RegisterFile,
    stack: CallStack,
    framebuffer: Framebuffer,
    timers: TimerClock,
    keypad: InputLatch,
    state: MachineState,
    config: MachineConfig,
    diagnostics: Vec<UnknownOpcode>,
    redraw: bool,
    rng: StdRng,
}

impl Chip8Interpreter {
    pub fn new(config: MachineConfig) -> Self {
        Chip8Interpreter::with_rng(config, StdRng::from_entropy())
    }

    /// a machine whose CXNN sequence is reproducible
    pub fn with_seed(config: MachineConfig, seed: u64) -> Self {
        Chip8Interpreter::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: MachineConfig, rng: StdRng) -> Self {
        Chip8Interpreter {
            memory: MemoryBus::new(config.address_mode),
            registers: RegisterFile::new(),
            stack: CallStack::new(),
            framebuffer: Framebuffer::new(),
            timers: TimerClock::new(),
            keypad: InputLatch::new(),
            state: MachineState::Running,
            config,
            diagnostics: Vec::new(),
            redraw: false,
            rng,
        }
    }

    /// power-on state: memory cleared apart from the font, everything else zeroed
    pub fn reset(&mut self) {
        log::debug!("resetting machine");
        self.memory = MemoryBus::new(self.config.address_mode);
        self.registers = RegisterFile::new();
        self.stack.clear();
        self.framebuffer.clear();
        self.timers = TimerClock::new();
        self.keypad = InputLatch::new();
        self.state = MachineState::Running;
        self.diagnostics.clear();
        self.redraw = false;
    }

    /// reset the machine and copy a program image to 0x200. an image that
    /// doesn't fit is rejected and the machine is left untouched
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), MachineError> {
        if image.len() > memory::CHIP8_MAX_PROGRAM_BYTES {
            return Err(MachineError::ImageTooLarge {
                size: image.len(),
                max: memory::CHIP8_MAX_PROGRAM_BYTES,
            });
        }
        self.reset();
        self.memory.load_image(image)?;
        log::debug!("loaded {} byte program", image.len());
        Ok(())
    }

    /// load a chip8 program
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<(), MachineError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        self.load_image(&buf)
    }

    /// 60Hz timer interrupt
    pub fn tick(&mut self) {
        self.timers.tick();
    }

    /// hand over the host's latest keypad snapshot
    pub fn set_keys(&mut self, keys: KeyState) {
        self.keypad.update(keys);
    }

    /// run one instruction, or check for the awaited key press
    pub fn step(&mut self) -> Result<Cycle, MachineError> {
        match self.state {
            MachineState::Halted => Err(MachineError::Halted),
            MachineState::WaitingForKey { register } => match self.keypad.any_just_pressed() {
                Some(key) => {
                    log::trace!("key {:x} satisfies wait into V{:X}", key, register);
                    self.registers.set(register, key);
                    self.state = MachineState::Running;
                    Ok(Cycle::Continue)
                }
                None => Ok(Cycle::AwaitingKey),
            },
            MachineState::Running => self.cycle().map_err(|e| {
                log::error!("halting at {:#06x}: {}", self.registers.pc, e);
                self.state = MachineState::Halted;
                e
            }),
        }
    }

    /// fetch, decode, execute
    fn cycle(&mut self) -> Result<Cycle, MachineError> {
        let pc = self.registers.pc;
        let op = self.memory.get_word(pc)?;
        let flow = match Instruction::decode(op) {
            Some(instruction) => {
                log::trace!("{:#06x}: {:04x} {:?}", pc, op, instruction);
                self.execute(instruction, pc)?
            }
            None => self.unknown_opcode(op, pc)?,
        };
        self.registers.pc = match flow {
            Flow::Next => pc.wrapping_add(2),
            Flow::Skip => pc.wrapping_add(4),
            Flow::Jump(addr) => addr,
        };

        if let MachineState::WaitingForKey { .. } = self.state {
            return Ok(Cycle::AwaitingKey);
        }
        if std::mem::take(&mut self.redraw) {
            Ok(Cycle::Redraw)
        } else {
            Ok(Cycle::Continue)
        }
    }

    fn unknown_opcode(&mut self, opcode: u16, pc: u16) -> Result<Flow, MachineError> {
        if self.config.strict_opcodes {
            return Err(MachineError::UnknownOpcode { opcode, pc });
        }
        // stderr shares the terminal with the display; only the first one is loud
        if self.diagnostics.is_empty() {
            log::warn!("skipping unknown opcode {:04x} at {:#06x}", opcode, pc);
        } else {
            log::debug!("skipping unknown opcode {:04x} at {:#06x}", opcode, pc);
        }
        self.diagnostics.push(UnknownOpcode { opcode, pc });
        Ok(Flow::Next)
    }

    fn execute(&mut self, instruction: Instruction, pc: u16) -> Result<Flow, MachineError> {
        use Instruction::*;
        let quirks = self.config.quirks;
        let r = &mut self.registers;

        let flow = match instruction {
            ClearScreen => {
                self.framebuffer.clear();
                self.redraw = true;
                Flow::Next
            }
            Return => Flow::Jump(self.stack.pop(pc)?),
            Jump(nnn) => Flow::Jump(nnn),
            Call(nnn) => {
                self.stack.push(pc.wrapping_add(2), pc)?;
                Flow::Jump(nnn)
            }
            SkipEqImm { x, nn } => Flow::skip_if(r.get(x) == nn),
            SkipNeImm { x, nn } => Flow::skip_if(r.get(x) != nn),
            SkipEqReg { x, y } => Flow::skip_if(r.get(x) == r.get(y)),
            SkipNeReg { x, y } => Flow::skip_if(r.get(x) != r.get(y)),
            LoadImm { x, nn } => {
                r.set(x, nn);
                Flow::Next
            }
            AddImm { x, nn } => {
                r.set(x, r.get(x).wrapping_add(nn));
                Flow::Next
            }
            LoadReg { x, y } => {
                r.set(x, r.get(y));
                Flow::Next
            }
            Or { x, y } | And { x, y } | Xor { x, y } => {
                let (vx, vy) = (r.get(x), r.get(y));
                r.set(
                    x,
                    match instruction {
                        Or { .. } => vx | vy,
                        And { .. } => vx & vy,
                        _ => vx ^ vy,
                    },
                );
                if quirks.logic_resets_vf {
                    r.set_flag(false);
                }
                Flow::Next
            }
            AddReg { x, y } => {
                let (sum, carry) = r.get(x).overflowing_add(r.get(y));
                r.set(x, sum);
                r.set_flag(carry);
                Flow::Next
            }
            SubXY { x, y } => {
                let (diff, borrow) = r.get(x).overflowing_sub(r.get(y));
                r.set(x, diff);
                r.set_flag(!borrow);
                Flow::Next
            }
            SubYX { x, y } => {
                let (diff, borrow) = r.get(y).overflowing_sub(r.get(x));
                r.set(x, diff);
                r.set_flag(!borrow);
                Flow::Next
            }
            ShiftRight { x, y } => {
                let source = r.get(if quirks.shift_uses_vy { y } else { x });
                r.set(x, source >> 1);
                r.set_flag(source & 0x01 != 0);
                Flow::Next
            }
            ShiftLeft { x, y } => {
                let source = r.get(if quirks.shift_uses_vy { y } else { x });
                r.set(x, source << 1);
                r.set_flag(source & 0x80 != 0);
                Flow::Next
            }
            LoadI(nnn) => {
                r.i = nnn;
                Flow::Next
            }
            JumpOffset { x, nnn } => {
                let offset = r.get(if quirks.jump_uses_vx { x } else { 0 });
                Flow::Jump(nnn + u16::from(offset))
            }
            Random { x, nn } => {
                let byte: u8 = self.rng.gen();
                r.set(x, byte & nn);
                Flow::Next
            }
            Draw { x, y, n } => {
                let (vx, vy) = (r.get(x) as usize, r.get(y) as usize);
                let i = r.i;
                let mut rows = [0u8; 15];
                for (offset, row) in rows.iter_mut().enumerate().take(n as usize) {
                    *row = self.memory.read(i.wrapping_add(offset as u16))?;
                }
                let collision = self.framebuffer.draw_sprite(vx, vy, &rows[..n as usize]);
                self.registers.set_flag(collision);
                self.redraw = true;
                Flow::Next
            }
            SkipKeyPressed { x } => Flow::skip_if(self.keypad.is_pressed(r.get(x))),
            SkipKeyNotPressed { x } => Flow::skip_if(!self.keypad.is_pressed(r.get(x))),
            LoadDelay { x } => {
                r.set(x, self.timers.delay);
                Flow::Next
            }
            WaitKey { x } => {
                self.keypad.arm();
                self.state = MachineState::WaitingForKey { register: x };
                Flow::Next
            }
            SetDelay { x } => {
                self.timers.delay = r.get(x);
                Flow::Next
            }
            SetSound { x } => {
                self.timers.sound = r.get(x);
                Flow::Next
            }
            AddI { x } => {
                let sum = r.i.wrapping_add(u16::from(r.get(x)));
                r.i = sum;
                if quirks.add_to_i_sets_vf {
                    r.set_flag(sum > 0x0fff);
                }
                Flow::Next
            }
            LoadFont { x } => {
                r.i = memory::font_addr(r.get(x));
                Flow::Next
            }
            StoreBcd { x } => {
                let (vx, i) = (r.get(x), r.i);
                self.memory.write(i, vx / 100)?;
                self.memory.write(i.wrapping_add(1), vx / 10 % 10)?;
                self.memory.write(i.wrapping_add(2), vx % 10)?;
                Flow::Next
            }
            StoreRegs { x } => {
                let i = r.i;
                for reg in 0..=x {
                    let value = self.registers.get(reg);
                    self.memory.write(i.wrapping_add(u16::from(reg)), value)?;
                }
                if quirks.load_store_increments_i {
                    self.registers.i = i.wrapping_add(u16::from(x) + 1);
                }
                Flow::Next
            }
            LoadRegs { x } => {
                let i = r.i;
                for reg in 0..=x {
                    let value = self.memory.read(i.wrapping_add(u16::from(reg)))?;
                    self.registers.set(reg, value);
                }
                if quirks.load_store_increments_i {
                    self.registers.i = i.wrapping_add(u16::from(x) + 1);
                }
                Flow::Next
            }
        };
        Ok(flow)
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn timers(&self) -> &TimerClock {
        &self.timers
    }

    pub fn memory(&self) -> &MemoryBus {
        &self.memory
    }

    pub fn keypad(&self) -> &InputLatch {
        &self.keypad
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    /// every unknown opcode skipped since the last load or reset
    pub fn diagnostics(&self) -> &[UnknownOpcode] {
        &self.diagnostics
    }

    pub fn sound_active(&self) -> bool {
        self.timers.sound_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AddressMode, Quirks};
    use crate::framebuffer::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
    use crate::registers::VF;

    fn machine(program: &[u8]) -> Result<Chip8Interpreter, MachineError> {
        machine_with(MachineConfig::default(), program)
    }

    fn machine_with(
        config: MachineConfig,
        program: &[u8],
    ) -> Result<Chip8Interpreter, MachineError> {
        let mut m = Chip8Interpreter::with_seed(config, 8);
        m.load_image(program)?;
        Ok(m)
    }

    fn quirky(quirks: Quirks) -> MachineConfig {
        MachineConfig {
            quirks,
            ..MachineConfig::default()
        }
    }

    fn run(m: &mut Chip8Interpreter, steps: usize) -> Result<(), MachineError> {
        for _ in 0..steps {
            m.step()?;
        }
        Ok(())
    }

    #[test]
    fn test_program_load_ok() -> Result<(), MachineError> {
        let mut i = Chip8Interpreter::new(MachineConfig::default());
        let mut prog: &[u8] = &[0x00, 0xe0]; // clear screen
        i.load_program(&mut prog)?;
        assert_eq!(i.memory().get_ro_slice(0x200, 2), &[0x00, 0xe0]);
        assert_eq!(i.registers().pc, 0x200);
        assert_eq!(i.state(), MachineState::Running);
        Ok(())
    }

    #[test]
    fn test_load_resets_state() -> Result<(), MachineError> {
        let mut m = machine(&[0x6A, 0x02, 0xF0, 0x0A, 0x2F, 0xFF])?;
        run(&mut m, 2)?;
        assert_eq!(m.state(), MachineState::WaitingForKey { register: 0 });
        m.load_image(&[0x12, 0x00])?;
        assert_eq!(m.state(), MachineState::Running);
        assert_eq!(m.registers(), &RegisterFile::new());
        // old program bytes are gone
        assert_eq!(m.memory().get_ro_slice(0x202, 4), &[0, 0, 0, 0]);
        Ok(())
    }

    #[test]
    fn test_oversized_load_leaves_machine_alone() -> Result<(), MachineError> {
        let mut m = machine(&[0x6A, 0x02])?;
        m.step()?;
        let image = vec![0u8; 0xe01];
        assert!(matches!(
            m.load_image(&image),
            Err(MachineError::ImageTooLarge { .. })
        ));
        assert_eq!(m.registers().v[0xA], 2);
        assert_eq!(m.registers().pc, 0x202);
        Ok(())
    }

    #[test]
    fn test_load_add_scenario() -> Result<(), MachineError> {
        let mut m = machine(&[0x6A, 0x02, 0x7A, 0x01])?;
        run(&mut m, 2)?;
        assert_eq!(m.registers().v[0xA], 3);
        assert_eq!(m.registers().pc, 0x204);
        Ok(())
    }

    #[test]
    fn test_set_i_scenario() -> Result<(), MachineError> {
        let mut m = machine(&[0xA2, 0x34])?;
        m.step()?;
        assert_eq!(m.registers().i, 0x234);
        assert_eq!(m.registers().pc, 0x202);
        Ok(())
    }

    #[test]
    fn test_00e0_cls() -> Result<(), MachineError> {
        let mut m = machine(&[0xA0, 0x50, 0xD0, 0x05, 0x00, 0xE0])?;
        m.step()?;
        assert_eq!(m.step()?, Cycle::Redraw);
        assert!(m.framebuffer().lit_pixels() > 0);
        assert_eq!(m.step()?, Cycle::Redraw);
        assert_eq!(m.framebuffer().lit_pixels(), 0);
        Ok(())
    }

    #[test]
    fn test_1nnn_jp() -> Result<(), MachineError> {
        let mut m = machine(&[0x1A, 0xBC])?;
        assert_eq!(m.step()?, Cycle::Continue);
        assert_eq!(m.registers().pc, 0x0ABC);
        Ok(())
    }

    #[test]
    fn test_2nnn_call_and_00ee_ret() -> Result<(), MachineError> {
        // 0x200: call 0x206; 0x206: ret
        let mut m = machine(&[0x22, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0xEE])?;
        m.step()?;
        assert_eq!(m.registers().pc, 0x206);
        assert_eq!(m.stack_depth(), 1);
        m.step()?;
        // back at the instruction after the call, not one further
        assert_eq!(m.registers().pc, 0x202);
        assert_eq!(m.stack_depth(), 0);
        Ok(())
    }

    #[test]
    fn test_stack_overflow_halts() -> Result<(), MachineError> {
        // 0x200: call 0x200, forever
        let mut m = machine(&[0x22, 0x00])?;
        run(&mut m, 16)?;
        assert_eq!(m.stack_depth(), 16);
        assert!(matches!(
            m.step(),
            Err(MachineError::StackOverflow { pc: 0x200 })
        ));
        assert_eq!(m.state(), MachineState::Halted);
        assert!(matches!(m.step(), Err(MachineError::Halted)));
        Ok(())
    }

    #[test]
    fn test_stack_underflow_halts() -> Result<(), MachineError> {
        let mut m = machine(&[0x00, 0xEE])?;
        assert!(matches!(
            m.step(),
            Err(MachineError::StackUnderflow { pc: 0x200 })
        ));
        assert_eq!(m.state(), MachineState::Halted);
        Ok(())
    }

    #[test]
    fn test_skips() -> Result<(), MachineError> {
        let cases: [(&[u8], u16); 8] = [
            (&[0x61, 0x11, 0x31, 0x11], 0x206), // 3xnn equal
            (&[0x61, 0x11, 0x31, 0x12], 0x204), // 3xnn not equal
            (&[0x61, 0x11, 0x41, 0x12], 0x206), // 4xnn not equal
            (&[0x61, 0x11, 0x41, 0x11], 0x204), // 4xnn equal
            (&[0x61, 0x11, 0x51, 0x20], 0x204), // 5xy0 v1 != v2
            (&[0x61, 0x00, 0x51, 0x20], 0x206), // 5xy0 v1 == v2
            (&[0x61, 0x11, 0x91, 0x20], 0x206), // 9xy0 v1 != v2
            (&[0x61, 0x00, 0x91, 0x20], 0x204), // 9xy0 v1 == v2
        ];
        for (program, pc) in cases {
            let mut m = machine(program)?;
            run(&mut m, 2)?;
            assert_eq!(m.registers().pc, pc, "program {:02x?}", program);
        }
        Ok(())
    }

    #[test]
    fn test_7xnn_wraps_without_flag() -> Result<(), MachineError> {
        let mut m = machine(&[0x6F, 0x05, 0x61, 0xFF, 0x71, 0x02])?;
        run(&mut m, 3)?;
        assert_eq!(m.registers().v[1], 0x01);
        assert_eq!(m.registers().v[VF], 0x05);
        Ok(())
    }

    #[test]
    fn test_8xy0_to_8xy3() -> Result<(), MachineError> {
        let cases = [(0x0u8, 0x3u8), (0x1, 0x7), (0x2, 0x2), (0x3, 0x5)];
        for (sub, expected) in cases {
            let mut m = machine(&[0x61, 0x06, 0x62, 0x03, 0x6F, 0x09, 0x81, 0x20 | sub])?;
            run(&mut m, 4)?;
            assert_eq!(m.registers().v[1], expected);
            // flag untouched by default
            assert_eq!(m.registers().v[VF], 0x09);
        }
        Ok(())
    }

    #[test]
    fn test_logic_resets_vf_quirk() -> Result<(), MachineError> {
        let config = quirky(Quirks {
            logic_resets_vf: true,
            ..Quirks::default()
        });
        let mut m = machine_with(config, &[0x6F, 0x09, 0x81, 0x21])?;
        run(&mut m, 2)?;
        assert_eq!(m.registers().v[VF], 0);
        Ok(())
    }

    /// loads a into V1, b into V2, then runs 8 1 2 `sub`
    fn alu(sub: u8, a: u8, b: u8) -> Result<Chip8Interpreter, MachineError> {
        let mut m = machine(&[0x61, a, 0x62, b, 0x81, 0x20 | sub])?;
        run(&mut m, 3)?;
        Ok(m)
    }

    #[test]
    fn test_8xy4_add_every_pair() -> Result<(), MachineError> {
        for a in (0..=255u8).step_by(3) {
            for b in (0..=255u8).step_by(5) {
                let m = alu(0x4, a, b)?;
                let sum = u16::from(a) + u16::from(b);
                assert_eq!(m.registers().v[1], (sum % 256) as u8);
                assert_eq!(m.registers().v[VF], u8::from(sum > 255));
            }
        }
        Ok(())
    }

    #[test]
    fn test_8xy5_sub_every_pair() -> Result<(), MachineError> {
        for a in (0..=255u8).step_by(3) {
            for b in (0..=255u8).step_by(5) {
                let m = alu(0x5, a, b)?;
                assert_eq!(m.registers().v[1], a.wrapping_sub(b));
                assert_eq!(m.registers().v[VF], u8::from(a >= b));
            }
        }
        Ok(())
    }

    #[test]
    fn test_8xy7_subn() -> Result<(), MachineError> {
        let m = alu(0x7, 0x11, 0x33)?;
        assert_eq!(m.registers().v[1], 0x22);
        assert_eq!(m.registers().v[VF], 1);
        let m = alu(0x7, 0x12, 0x11)?;
        assert_eq!(m.registers().v[1], 0xFF);
        assert_eq!(m.registers().v[VF], 0);
        Ok(())
    }

    #[test]
    fn test_flag_wins_when_vf_is_destination() -> Result<(), MachineError> {
        // vF = 0xFF; v1 = 0x01; vF += v1 -> carry, so vF ends up 1 not 0
        let mut m = machine(&[0x6F, 0xFF, 0x61, 0x01, 0x8F, 0x14])?;
        run(&mut m, 3)?;
        assert_eq!(m.registers().v[VF], 1);
        Ok(())
    }

    #[test]
    fn test_8xy6_shr() -> Result<(), MachineError> {
        let m = alu(0x6, 0x5, 0x0)?;
        assert_eq!(m.registers().v[1], 0x2);
        assert_eq!(m.registers().v[VF], 0x1);
        let m = alu(0x6, 0x4, 0x0)?;
        assert_eq!(m.registers().v[1], 0x2);
        assert_eq!(m.registers().v[VF], 0x0);
        Ok(())
    }

    #[test]
    fn test_8xye_shl() -> Result<(), MachineError> {
        let m = alu(0xE, 0xFF, 0x0)?;
        assert_eq!(m.registers().v[1], 0xFE);
        assert_eq!(m.registers().v[VF], 0x1);
        let m = alu(0xE, 0x4, 0x0)?;
        assert_eq!(m.registers().v[1], 0x8);
        assert_eq!(m.registers().v[VF], 0x0);
        Ok(())
    }

    #[test]
    fn test_shift_uses_vy_quirk() -> Result<(), MachineError> {
        let config = quirky(Quirks {
            shift_uses_vy: true,
            ..Quirks::default()
        });
        let mut m = machine_with(config, &[0x61, 0xF0, 0x62, 0x81, 0x81, 0x26])?;
        run(&mut m, 3)?;
        assert_eq!(m.registers().v[1], 0x40);
        assert_eq!(m.registers().v[2], 0x81);
        assert_eq!(m.registers().v[VF], 1);
        Ok(())
    }

    #[test]
    fn test_bnnn_jumps_from_v0() -> Result<(), MachineError> {
        let mut m = machine(&[0x60, 0x02, 0x63, 0x10, 0xB3, 0x00])?;
        run(&mut m, 3)?;
        assert_eq!(m.registers().pc, 0x302);
        Ok(())
    }

    #[test]
    fn test_bnnn_jump_uses_vx_quirk() -> Result<(), MachineError> {
        let config = quirky(Quirks {
            jump_uses_vx: true,
            ..Quirks::default()
        });
        let mut m = machine_with(config, &[0x60, 0x02, 0x63, 0x10, 0xB3, 0x00])?;
        run(&mut m, 3)?;
        assert_eq!(m.registers().pc, 0x310);
        Ok(())
    }

    #[test]
    fn test_cxnn_masks_random_byte() -> Result<(), MachineError> {
        let mut m = machine(&[0xC1, 0x0F, 0xC2, 0x00])?;
        run(&mut m, 2)?;
        assert!(m.registers().v[1] <= 0x0F);
        assert_eq!(m.registers().v[2], 0);
        Ok(())
    }

    #[test]
    fn test_cxnn_is_reproducible_with_seed() -> Result<(), MachineError> {
        let program = [0xC1, 0xFF, 0xC2, 0xFF, 0xC3, 0xFF];
        let mut a = machine(&program)?;
        let mut b = machine(&program)?;
        run(&mut a, 3)?;
        run(&mut b, 3)?;
        assert_eq!(a.registers().v, b.registers().v);
        Ok(())
    }

    #[test]
    fn test_dxyn_draws_font_zero() -> Result<(), MachineError> {
        // I = font 0; v0 = 1; draw at (1, 1)
        let mut m = machine(&[0x60, 0x00, 0xF0, 0x29, 0x60, 0x01, 0x00, 0xE0, 0xD0, 0x05])?;
        run(&mut m, 5)?;
        let expected: [[u8; 4]; 5] = [
            [1, 1, 1, 1],
            [1, 0, 0, 1],
            [1, 0, 0, 1],
            [1, 0, 0, 1],
            [1, 1, 1, 1],
        ];
        let fb = m.framebuffer();
        for y in 0..DISPLAY_HEIGHT {
            for x in 0..DISPLAY_WIDTH {
                let want =
                    (1..6).contains(&y) && (1..5).contains(&x) && expected[y - 1][x - 1] == 1;
                assert_eq!(fb.get(x, y), want, "pixel ({}, {})", x, y);
            }
        }
        assert_eq!(m.registers().v[VF], 0);
        Ok(())
    }

    /// 8x5 test sprite placed at 0x300
    const SPRITE: [u8; 5] = [0xFF, 0x81, 0xA5, 0x81, 0xFF];

    fn sprite_machine(x: u8, y: u8) -> Result<Chip8Interpreter, MachineError> {
        let mut program = vec![0x00, 0xE0, 0x61, x, 0x62, y, 0xA3, 0x00, 0xD1, 0x25, 0xD1, 0x25];
        program.resize(0x100, 0);
        program.extend_from_slice(&SPRITE);
        machine(&program)
    }

    #[test]
    fn test_dxyn_matches_sprite_with_wrap() -> Result<(), MachineError> {
        for (x, y) in [(10u8, 7u8), (63, 31), (60, 30)] {
            let mut m = sprite_machine(x, y)?;
            run(&mut m, 5)?;
            let fb = m.framebuffer();
            for (dy, row) in SPRITE.iter().enumerate() {
                for dx in 0..8 {
                    let px = (x as usize + dx) % DISPLAY_WIDTH;
                    let py = (y as usize + dy) % DISPLAY_HEIGHT;
                    assert_eq!(fb.get(px, py), row & (0x80 >> dx) != 0);
                }
            }
            let on: usize = SPRITE.iter().map(|r| r.count_ones() as usize).sum();
            assert_eq!(fb.lit_pixels(), on);
            assert_eq!(m.registers().v[VF], 0);
        }
        Ok(())
    }

    #[test]
    fn test_dxyn_second_draw_erases_and_collides() -> Result<(), MachineError> {
        let mut m = sprite_machine(63, 31)?;
        run(&mut m, 5)?;
        assert_eq!(m.step()?, Cycle::Redraw);
        assert_eq!(m.framebuffer().lit_pixels(), 0);
        assert_eq!(m.registers().v[VF], 1);
        Ok(())
    }

    #[test]
    fn test_dxyn_xors() -> Result<(), MachineError> {
        // draw a single 0b1100_0000 row at (0, 0), then 0b1010_0000 over it
        let mut program = vec![0xA3, 0x00, 0xD0, 0x01, 0xA3, 0x01, 0xD0, 0x01];
        program.resize(0x100, 0);
        program.extend_from_slice(&[0xC0, 0xA0]);
        let mut m = machine(&program)?;
        run(&mut m, 4)?;
        let row: Vec<bool> = (0..4).map(|x| m.framebuffer().get(x, 0)).collect();
        assert_eq!(row, [false, true, true, false]);
        assert_eq!(m.registers().v[VF], 1);
        Ok(())
    }

    #[test]
    fn test_ex9e_exa1() -> Result<(), MachineError> {
        let mut keys = [false; 16];
        keys[0xE] = true;

        // v1 = 0x1E; the low nibble picks key E
        let mut m = machine(&[0x61, 0x1E, 0xE1, 0x9E])?;
        m.set_keys(keys);
        assert_eq!(m.keypad().snapshot(), keys);
        run(&mut m, 2)?;
        assert_eq!(m.registers().pc, 0x206);

        let mut m = machine(&[0x61, 0x1E, 0xE1, 0xA1])?;
        m.set_keys(keys);
        run(&mut m, 2)?;
        assert_eq!(m.registers().pc, 0x204);

        let mut m = machine(&[0x61, 0x0D, 0xE1, 0xA1])?;
        m.set_keys(keys);
        run(&mut m, 2)?;
        assert_eq!(m.registers().pc, 0x206);
        Ok(())
    }

    #[test]
    fn test_fx0a_waits_without_blocking() -> Result<(), MachineError> {
        let mut held = [false; 16];
        held[0x3] = true;
        let mut m = machine(&[0xF5, 0x0A, 0x61, 0x01])?;
        m.set_keys(held);
        assert_eq!(m.step()?, Cycle::AwaitingKey);
        assert_eq!(m.state(), MachineState::WaitingForKey { register: 5 });
        assert_eq!(m.registers().pc, 0x202);

        // a key already held when the wait began doesn't count
        m.set_keys(held);
        assert_eq!(m.step()?, Cycle::AwaitingKey);
        assert_eq!(m.step()?, Cycle::AwaitingKey);
        assert_eq!(m.registers().pc, 0x202);

        let mut pressed = held;
        pressed[0xB] = true;
        m.set_keys(pressed);
        assert_eq!(m.step()?, Cycle::Continue);
        assert_eq!(m.state(), MachineState::Running);
        assert_eq!(m.registers().v[5], 0xB);

        m.step()?;
        assert_eq!(m.registers().v[1], 1);
        assert_eq!(m.registers().pc, 0x204);
        Ok(())
    }

    #[test]
    fn test_timers_instructions() -> Result<(), MachineError> {
        // v1 = 5; delay = v1; sound = v1; v2 = delay
        let mut m = machine(&[0x61, 0x05, 0xF1, 0x15, 0xF1, 0x18, 0xF2, 0x07])?;
        run(&mut m, 3)?;
        assert!(m.sound_active());
        m.tick();
        m.tick();
        m.step()?;
        assert_eq!(m.registers().v[2], 3);
        for _ in 0..100 {
            m.tick();
        }
        assert_eq!(m.timers().delay, 0);
        assert!(!m.sound_active());
        Ok(())
    }

    #[test]
    fn test_fx1e_add_i() -> Result<(), MachineError> {
        let mut m = machine(&[0xAF, 0xFF, 0x6F, 0x07, 0x61, 0x02, 0xF1, 0x1E])?;
        run(&mut m, 4)?;
        assert_eq!(m.registers().i, 0x1001);
        // no flag change by default
        assert_eq!(m.registers().v[VF], 0x07);
        Ok(())
    }

    #[test]
    fn test_fx1e_sets_vf_quirk() -> Result<(), MachineError> {
        let config = quirky(Quirks {
            add_to_i_sets_vf: true,
            ..Quirks::default()
        });
        let mut m = machine_with(config, &[0xAF, 0xFF, 0x61, 0x02, 0xF1, 0x1E, 0xF1, 0x1E])?;
        run(&mut m, 3)?;
        assert_eq!(m.registers().v[VF], 1);
        Ok(())
    }

    #[test]
    fn test_fx29_font() -> Result<(), MachineError> {
        let mut m = machine(&[0x61, 0x2A, 0xF1, 0x29])?;
        run(&mut m, 2)?;
        assert_eq!(m.registers().i, 0x050 + 0xA * 5);
        Ok(())
    }

    #[test]
    fn test_fx33_bcd() -> Result<(), MachineError> {
        // 0x7B -> 123
        let mut m = machine(&[0x61, 0x7B, 0xA3, 0x00, 0xF1, 0x33])?;
        run(&mut m, 3)?;
        assert_eq!(m.memory().get_ro_slice(0x300, 3), &[0x1, 0x2, 0x3]);
        Ok(())
    }

    #[test]
    fn test_fx55_fx65() -> Result<(), MachineError> {
        let mut program = vec![0xA3, 0x00, 0xF4, 0x65, 0xA3, 0x10, 0xF4, 0x55];
        program.resize(0x100, 0);
        program.extend_from_slice(&[0x1, 0x2, 0x3, 0x4, 0x5, 0x6]);
        let mut m = machine(&program)?;
        run(&mut m, 2)?;
        assert_eq!(m.registers().v[0..6], [0x1, 0x2, 0x3, 0x4, 0x5, 0x0]);
        assert_eq!(m.registers().i, 0x300);
        run(&mut m, 2)?;
        assert_eq!(m.memory().get_ro_slice(0x310, 6), &[0x1, 0x2, 0x3, 0x4, 0x5, 0x0]);
        assert_eq!(m.registers().i, 0x310);
        Ok(())
    }

    #[test]
    fn test_load_store_increments_i_quirk() -> Result<(), MachineError> {
        let config = quirky(Quirks {
            load_store_increments_i: true,
            ..Quirks::default()
        });
        let mut m = machine_with(config, &[0xA3, 0x00, 0xF4, 0x55, 0xF1, 0x65])?;
        run(&mut m, 2)?;
        assert_eq!(m.registers().i, 0x305);
        run(&mut m, 1)?;
        assert_eq!(m.registers().i, 0x307);
        Ok(())
    }

    #[test]
    fn test_unknown_opcode_is_logged_and_skipped() -> Result<(), MachineError> {
        let mut m = machine(&[0x01, 0x23, 0x61, 0x01, 0xFF, 0xFF])?;
        run(&mut m, 3)?;
        assert_eq!(m.registers().v[1], 1);
        assert_eq!(m.registers().pc, 0x206);
        assert_eq!(
            m.diagnostics(),
            &[
                UnknownOpcode { opcode: 0x0123, pc: 0x200 },
                UnknownOpcode { opcode: 0xFFFF, pc: 0x204 },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_repeated_unknown_opcode_keeps_running() -> Result<(), MachineError> {
        // unknown word, then jump back to it
        let mut m = machine(&[0xFF, 0xFF, 0x12, 0x00])?;
        run(&mut m, 10)?;
        assert_eq!(m.state(), MachineState::Running);
        assert_eq!(m.diagnostics().len(), 5);
        assert!(m.diagnostics().iter().all(|d| d.pc == 0x200));
        Ok(())
    }

    #[test]
    fn test_unknown_opcode_halts_in_strict_mode() -> Result<(), MachineError> {
        let config = MachineConfig {
            strict_opcodes: true,
            ..MachineConfig::default()
        };
        let mut m = machine_with(config, &[0x01, 0x23])?;
        assert!(matches!(
            m.step(),
            Err(MachineError::UnknownOpcode { opcode: 0x0123, pc: 0x200 })
        ));
        assert_eq!(m.state(), MachineState::Halted);
        assert!(m.diagnostics().is_empty());
        Ok(())
    }

    #[test]
    fn test_out_of_range_i_wraps_by_default() -> Result<(), MachineError> {
        // I = 0xFFF; v1 = 0xFF; I += v1 (0x10FE); bcd of 255 at 0x10FE..
        let mut m = machine(&[0xAF, 0xFF, 0x61, 0xFF, 0xF1, 0x1E, 0xF1, 0x33])?;
        run(&mut m, 4)?;
        assert_eq!(m.memory().get_ro_slice(0x0FE, 3), &[2, 5, 5]);
        Ok(())
    }

    #[test]
    fn test_out_of_range_i_halts_in_strict_addressing() -> Result<(), MachineError> {
        let config = MachineConfig {
            address_mode: AddressMode::Strict,
            ..MachineConfig::default()
        };
        let mut m = machine_with(config, &[0xAF, 0xFF, 0x61, 0xFF, 0xF1, 0x1E, 0xF1, 0x33])?;
        run(&mut m, 3)?;
        assert!(matches!(
            m.step(),
            Err(MachineError::AddressOutOfRange { addr: 0x10FE })
        ));
        assert_eq!(m.state(), MachineState::Halted);
        Ok(())
    }

    #[test]
    fn test_reset_recovers_from_halt() -> Result<(), MachineError> {
        let mut m = machine(&[0x00, 0xEE])?;
        assert!(m.step().is_err());
        m.reset();
        assert_eq!(m.state(), MachineState::Running);
        assert_eq!(m.config(), &MachineConfig::default());
        assert_eq!(m.registers().pc, 0x200);
        Ok(())
    }
}
