/// Behaviour that differs between historical CHIP-8 interpreters. Defaults
/// follow the common modern convention; each toggle selects the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quirks {
    /// 8XY6/8XYE shift VY into VX (COSMAC VIP) rather than shifting VX in place
    pub shift_uses_vy: bool,
    /// BNNN jumps to NNN + VX (CHIP-48/SCHIP) rather than NNN + V0
    pub jump_uses_vx: bool,
    /// FX55/FX65 leave I pointing past the last register touched
    pub load_store_increments_i: bool,
    /// FX1E sets VF when I overflows past 0xFFF (Amiga interpreter)
    pub add_to_i_sets_vf: bool,
    /// 8XY1/8XY2/8XY3 zero VF (COSMAC VIP)
    pub logic_resets_vf: bool,
}

/// What to do when I or the program counter points past the end of memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    /// addresses wrap modulo the memory size
    #[default]
    Wrap,
    /// out-of-range access halts the machine
    Strict,
}

/// Configuration of the machine itself, independent of any host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MachineConfig {
    pub quirks: Quirks,
    pub address_mode: AddressMode,
    /// halt on an unknown opcode instead of logging it and carrying on
    pub strict_opcodes: bool,
}

pub const DEFAULT_INSTRUCTIONS_PER_SECOND: u32 = 700;
pub const DEFAULT_FRAME_RATE: u32 = 60;
/// delay and sound timers count down at this rate whatever the frame rate
pub const TIMER_HZ: u32 = 60;

/// Host pacing: how many instructions to run for every timer/render frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub instructions_per_second: u32,
    pub frame_rate: u32,
}

impl Settings {
    pub fn new(instructions_per_second: u32, frame_rate: u32) -> Self {
        Settings {
            instructions_per_second,
            frame_rate: frame_rate.max(1),
        }
    }

    /// instructions per frame, possibly fractional
    pub fn steps_per_frame(&self) -> f64 {
        f64::from(self.instructions_per_second) / f64::from(self.frame_rate)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new(DEFAULT_INSTRUCTIONS_PER_SECOND, DEFAULT_FRAME_RATE)
    }
}
