use std::io;

use crate::config::AddressMode;
use crate::error::MachineError;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// Represents a byte-addressable memory map
pub trait MemoryMap {
    /// read one byte
    fn read(&self, addr: u16) -> Result<u8, MachineError>;

    /// write one byte
    fn write(&mut self, addr: u16, byte: u8) -> Result<(), MachineError>;

    /// get a big-endian two-byte word (instructions)
    fn get_word(&self, addr: u16) -> Result<u16, MachineError> {
        let hi = self.read(addr)?;
        let lo = self.read(addr.wrapping_add(1))?;
        Ok(u16::from(hi) << 8 | u16::from(lo))
    }

    /// write a chunk of bytes starting at a particular address
    fn write_slice(&mut self, data: &[u8], addr: u16) -> Result<(), MachineError> {
        for (offset, byte) in data.iter().enumerate() {
            self.write(addr.wrapping_add(offset as u16), *byte)?;
        }
        Ok(())
    }
}

/// how much RAM we have
pub const CHIP8_RAM_SIZE_BYTES: usize = 4096;

/// where the program is loaded
pub const CHIP8_PROGRAM_ADDR: u16 = 0x0200;

/// the biggest image that fits between the program address and the top of RAM
pub const CHIP8_MAX_PROGRAM_BYTES: usize = CHIP8_RAM_SIZE_BYTES - CHIP8_PROGRAM_ADDR as usize;

/// Defines the CHIP-8 standard memory map, 4K configuration:
///   0x0000-0x004f  reserved (interpreter on real hardware)
///   0x0050-0x009f  hex digit font
///   0x00a0-0x01ff  reserved
///   0x0200-0x0fff  program
///
/// The stack and display live outside addressable memory.
pub struct MemoryBus {
    bytes: Box<[u8; CHIP8_RAM_SIZE_BYTES]>,
    mode: AddressMode,
}

impl MemoryMap for MemoryBus {
    fn read(&self, addr: u16) -> Result<u8, MachineError> {
        Ok(self.bytes[self.resolve(addr)?])
    }

    fn write(&mut self, addr: u16, byte: u8) -> Result<(), MachineError> {
        let a = self.resolve(addr)?;
        self.bytes[a] = byte;
        Ok(())
    }
}

impl MemoryBus {
    /// initialises memory with the font baked in
    pub fn new(mode: AddressMode) -> Self {
        let mut bytes = Box::new([0u8; CHIP8_RAM_SIZE_BYTES]);
        let font = CHIP8_FONT_ADDR as usize;
        bytes[font..font + CHIP8_FONT.len()].copy_from_slice(&CHIP8_FONT);
        MemoryBus { bytes, mode }
    }

    /// map a CPU address to an index into RAM, per the address policy
    fn resolve(&self, addr: u16) -> Result<usize, MachineError> {
        let a = addr as usize;
        match self.mode {
            AddressMode::Wrap => Ok(a % CHIP8_RAM_SIZE_BYTES),
            AddressMode::Strict if a < CHIP8_RAM_SIZE_BYTES => Ok(a),
            AddressMode::Strict => Err(MachineError::AddressOutOfRange { addr }),
        }
    }

    /// copy a program image to 0x200; nothing is written if it won't fit
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), MachineError> {
        if image.len() > CHIP8_MAX_PROGRAM_BYTES {
            return Err(MachineError::ImageTooLarge {
                size: image.len(),
                max: CHIP8_MAX_PROGRAM_BYTES,
            });
        }
        let start = CHIP8_PROGRAM_ADDR as usize;
        self.bytes[start..start + image.len()].copy_from_slice(image);
        Ok(())
    }

    /// load a CHIP-8 program at 0x200 from anything readable
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<(), MachineError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        self.load_image(&buf)
    }

    /// r/o view of a region, clamped to the end of RAM
    pub fn get_ro_slice(&self, addr: u16, len: usize) -> &[u8] {
        let a = (addr as usize).min(CHIP8_RAM_SIZE_BYTES);
        &self.bytes[a..(a + len).min(CHIP8_RAM_SIZE_BYTES)]
    }
}

/// address of the sprite for a hex digit; only the low nibble counts
pub fn font_addr(digit: u8) -> u16 {
    CHIP8_FONT_ADDR + u16::from(digit & 0x0f) * CHIP8_FONT_SPRITE_BYTES
}

pub const CHIP8_FONT_ADDR: u16 = 0x050;
pub const CHIP8_FONT_SPRITE_BYTES: u16 = 5;
const CHIP8_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
