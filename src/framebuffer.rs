pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;
pub const DISPLAY_BYTES: usize = DISPLAY_WIDTH * DISPLAY_HEIGHT / 8;

/// 64x32 monochrome pixels, packed row-major eight to a byte with the
/// leftmost pixel in the most significant bit. This is the layout
/// `Display::draw` expects.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Framebuffer {
    bytes: [u8; DISPLAY_BYTES],
}

impl Framebuffer {
    pub fn new() -> Self {
        Framebuffer {
            bytes: [0; DISPLAY_BYTES],
        }
    }

    pub fn clear(&mut self) {
        self.bytes = [0; DISPLAY_BYTES];
    }

    /// (byte index, bit mask) of a pixel; coordinates wrap
    fn locate(x: usize, y: usize) -> (usize, u8) {
        let count = (y % DISPLAY_HEIGHT) * DISPLAY_WIDTH + (x % DISPLAY_WIDTH);
        (count / 8, 0x80 >> (count % 8))
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        let (byte, mask) = Self::locate(x, y);
        self.bytes[byte] & mask != 0
    }

    /// flip one pixel; true if it was on and is now off
    pub fn toggle(&mut self, x: usize, y: usize) -> bool {
        let (byte, mask) = Self::locate(x, y);
        let was_on = self.bytes[byte] & mask != 0;
        self.bytes[byte] ^= mask;
        was_on
    }

    /// XOR sprite rows onto the screen at (x, y). Each pixel wraps on its own
    /// axis. Returns true if any pixel was turned off.
    pub fn draw_sprite(&mut self, x: usize, y: usize, rows: &[u8]) -> bool {
        let mut collision = false;
        for (dy, row) in rows.iter().enumerate() {
            for dx in 0..8 {
                if row & (0x80 >> dx) != 0 {
                    collision |= self.toggle(x + dx, y + dy);
                }
            }
        }
        collision
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn lit_pixels(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for y in 0..DISPLAY_HEIGHT {
            for x in 0..DISPLAY_WIDTH {
                f.write_str(if self.get(x, y) { "#" } else { "." })?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_blank() {
        let fb = Framebuffer::new();
        assert_eq!(fb.as_bytes().len(), 256);
        assert_eq!(fb.lit_pixels(), 0);
    }

    #[test]
    fn test_bit_layout() {
        let mut fb = Framebuffer::new();
        fb.toggle(0, 0);
        fb.toggle(9, 0);
        fb.toggle(63, 31);
        assert_eq!(fb.as_bytes()[0], 0x80);
        assert_eq!(fb.as_bytes()[1], 0x40);
        assert_eq!(fb.as_bytes()[255], 0x01);
    }

    #[test]
    fn test_toggle_reports_turn_off() {
        let mut fb = Framebuffer::new();
        assert!(!fb.toggle(3, 4));
        assert!(fb.get(3, 4));
        assert!(fb.toggle(3, 4));
        assert!(!fb.get(3, 4));
    }

    #[test]
    fn test_sprite_wraps_both_axes() {
        let mut fb = Framebuffer::new();
        // 0b1100_0000 twice, drawn at the bottom-right corner
        let collided = fb.draw_sprite(63, 31, &[0xC0, 0xC0]);
        assert!(!collided);
        assert!(fb.get(63, 31));
        assert!(fb.get(0, 31));
        assert!(fb.get(63, 0));
        assert!(fb.get(0, 0));
        assert_eq!(fb.lit_pixels(), 4);
    }

    #[test]
    fn test_sprite_xor_is_idempotent_pair() {
        let mut fb = Framebuffer::new();
        fb.toggle(8, 10);
        let before = fb;
        assert!(fb.draw_sprite(8, 9, &[0xFF, 0x81, 0xFF]));
        assert!(fb.draw_sprite(8, 9, &[0xFF, 0x81, 0xFF]));
        assert_eq!(fb, before);
    }

    #[test]
    fn test_clear() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(0, 0, &[0xFF; 15]);
        fb.clear();
        assert_eq!(fb, Framebuffer::new());
    }
}
