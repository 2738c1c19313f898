use crate::error::MachineError;

/// the COSMAC VIP reserved room for 12 levels; 16 is the common allowance
pub const CHIP8_STACK_DEPTH: usize = 16;

/// Return addresses for subroutine calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStack {
    frames: Vec<u16>,
}

impl CallStack {
    pub fn new() -> Self {
        CallStack {
            frames: Vec::with_capacity(CHIP8_STACK_DEPTH),
        }
    }

    /// `pc` is the address of the call instruction, for error reporting
    pub fn push(&mut self, ret: u16, pc: u16) -> Result<(), MachineError> {
        if self.frames.len() == CHIP8_STACK_DEPTH {
            return Err(MachineError::StackOverflow { pc });
        }
        self.frames.push(ret);
        Ok(())
    }

    /// `pc` is the address of the return instruction, for error reporting
    pub fn pop(&mut self, pc: u16) -> Result<u16, MachineError> {
        self.frames.pop().ok_or(MachineError::StackUnderflow { pc })
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}
