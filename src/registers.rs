use crate::memory::CHIP8_PROGRAM_ADDR;

/// index of VF, the carry/borrow/collision flag
pub const VF: usize = 0xf;

/// V0-VF, the I pointer and the program counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterFile {
    pub v: [u8; 16],
    pub i: u16,
    pub pc: u16,
}

impl RegisterFile {
    pub fn new() -> Self {
        RegisterFile {
            v: [0; 16],
            i: 0,
            pc: CHIP8_PROGRAM_ADDR,
        }
    }

    /// read VX; only the low nibble of `x` selects the register
    pub fn get(&self, x: u8) -> u8 {
        self.v[(x & 0x0f) as usize]
    }

    pub fn set(&mut self, x: u8, value: u8) {
        self.v[(x & 0x0f) as usize] = value;
    }

    /// write VF. instructions that also write VX call this last, so that
    /// the flag wins when X is F
    pub fn set_flag(&mut self, flag: bool) {
        self.v[VF] = u8::from(flag);
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}
