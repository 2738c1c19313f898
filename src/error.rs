use std::io;

/// Everything that can go wrong inside the machine. Stack misuse and strict
/// mode violations are fatal and leave the interpreter halted.
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    #[error("program image is too large ({size} bytes), max size is {max} bytes")]
    ImageTooLarge { size: usize, max: usize },

    #[error("stack overflow: call at {pc:#06x} exceeds 16 nested subroutines")]
    StackOverflow { pc: u16 },

    #[error("stack underflow: return at {pc:#06x} with empty call stack")]
    StackUnderflow { pc: u16 },

    #[error("unknown opcode {opcode:#06x} at {pc:#06x}")]
    UnknownOpcode { opcode: u16, pc: u16 },

    #[error("memory access out of range at {addr:#06x}")]
    AddressOutOfRange { addr: u16 },

    #[error("machine is halted")]
    Halted,

    #[error(transparent)]
    Io(#[from] io::Error),
}
