/// # Opcodes
///
/// CHIP-8 opcodes are 16 bits, fetched big-endian. The high nibble picks the
/// instruction class; the remaining nibbles either refine it or carry data:
/// - `[_nnn]` a 12-bit address
/// - `[__nn]` an immediate byte
/// - `[_x__]` register VX, or the range V0..=VX
/// - `[__y_]` register VY
/// - `[___n]` a 4-bit immediate (sprite height) or sub-operation
pub trait Opcode {
    /// all four nibbles, high first
    fn nibbles(&self) -> (u8, u8, u8, u8);

    /// `[c___]`
    fn class(&self) -> u8;

    /// `[_x__]`
    fn x(&self) -> u8;

    /// `[__y_]`
    fn y(&self) -> u8;

    /// `[___n]`
    fn n(&self) -> u8;

    /// `[__nn]`
    fn nn(&self) -> u8;

    /// `[_nnn]`
    fn nnn(&self) -> u16;
}

impl Opcode for u16 {
    fn nibbles(&self) -> (u8, u8, u8, u8) {
        (self.class(), self.x(), self.y(), self.n())
    }

    fn class(&self) -> u8 {
        ((self & 0xF000) >> 12) as u8
    }

    fn x(&self) -> u8 {
        ((self & 0x0F00) >> 8) as u8
    }

    fn y(&self) -> u8 {
        ((self & 0x00F0) >> 4) as u8
    }

    fn n(&self) -> u8 {
        (self & 0x000F) as u8
    }

    fn nn(&self) -> u8 {
        (self & 0x00FF) as u8
    }

    fn nnn(&self) -> u16 {
        self & 0x0FFF
    }
}
