use crossterm::cursor;
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

use crate::framebuffer::{DISPLAY_BYTES, DISPLAY_HEIGHT, DISPLAY_WIDTH};

/// Where the host sends the machine's framebuffer. Implementations only ever
/// see the packed bytes, so any kind of screen can sit behind it.
pub trait Display {
    /// render one frame of packed 1bpp pixels, most significant bit leftmost
    fn draw(&mut self, data: &[u8]) -> Result<(), io::Error>;

    /// how many bytes `draw` expects
    fn frame_bytes(&self) -> usize {
        DISPLAY_BYTES
    }
}

/// canvas coordinates of every lit pixel in a `width` pixel wide packed
/// frame. rows count down from the top on the machine but up on the canvas
fn lit_points(data: &[u8], width: usize, height: usize) -> Vec<(f64, f64)> {
    data.iter()
        .enumerate()
        .flat_map(|(index, byte)| {
            (0..8)
                .filter(move |&bit| byte & (0x80u8 >> bit) != 0)
                .map(move |bit| index * 8 + bit)
        })
        .map(|pixel| {
            let (x, row) = (pixel % width, pixel / width);
            (x as f64, (height - 1 - row) as f64)
        })
        .collect()
}

/// monochrome CHIP-8 screen in the terminal: a tui canvas over crossterm,
/// one block character per pixel
pub struct MonoTermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl MonoTermDisplay {
    /// take over the terminal until dropped
    pub fn chip8() -> Result<MonoTermDisplay, io::Error> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.clear()?;
        Ok(MonoTermDisplay { terminal })
    }
}

impl Drop for MonoTermDisplay {
    fn drop(&mut self) {
        if let Err(e) = execute!(io::stdout(), cursor::Show, LeaveAlternateScreen) {
            log::error!("couldn't restore terminal: {}", e);
        }
    }
}

impl Display for MonoTermDisplay {
    fn draw(&mut self, data: &[u8]) -> Result<(), io::Error> {
        if data.len() != DISPLAY_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("expected {} bytes of frame, got {}", DISPLAY_BYTES, data.len()),
            ));
        }

        let lit = lit_points(data, DISPLAY_WIDTH, DISPLAY_HEIGHT);
        self.terminal.draw(|f| {
            // border plus one cell per pixel
            let area = Rect::new(0, 0, DISPLAY_WIDTH as u16 + 2, DISPLAY_HEIGHT as u16 + 2);
            let screen = Canvas::default()
                .block(
                    Block::default()
                        .title("CHIP-8")
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds([0.0, (DISPLAY_WIDTH - 1) as f64])
                .y_bounds([0.0, (DISPLAY_HEIGHT - 1) as f64])
                .marker(Marker::Block)
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: &lit,
                        color: Color::White,
                    });
                });
            f.render_widget(screen, area);
        })?;
        Ok(())
    }
}

/// keeps every frame it's given; stands in for a screen in tests
#[derive(Debug, Default)]
pub struct DummyDisplay {
    pub frames: Vec<Vec<u8>>,
}

impl DummyDisplay {
    pub fn new() -> DummyDisplay {
        DummyDisplay::default()
    }
}

impl Display for DummyDisplay {
    fn draw(&mut self, data: &[u8]) -> Result<(), io::Error> {
        if data.len() != self.frame_bytes() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "wrong frame size"));
        }
        self.frames.push(data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_frame_has_no_points() {
        assert!(lit_points(&[0; DISPLAY_BYTES], DISPLAY_WIDTH, DISPLAY_HEIGHT).is_empty());
    }

    #[test]
    fn test_corners_map_to_canvas() {
        let mut data = [0u8; DISPLAY_BYTES];
        data[0] = 0x80; // (0, 0), top left
        data[DISPLAY_BYTES - 1] = 0x01; // (63, 31), bottom right
        let lit = lit_points(&data, DISPLAY_WIDTH, DISPLAY_HEIGHT);
        assert_eq!(lit, vec![(0.0, 31.0), (63.0, 0.0)]);
    }

    #[test]
    fn test_bit_order_within_byte() {
        let mut data = [0u8; DISPLAY_BYTES];
        data[1] = 0b0100_0001; // x = 9 and x = 15 on the top row
        let lit = lit_points(&data, DISPLAY_WIDTH, DISPLAY_HEIGHT);
        assert_eq!(lit, vec![(9.0, 31.0), (15.0, 31.0)]);
    }

    #[test]
    fn test_dummy_display_records_frames() -> Result<(), io::Error> {
        let mut d = DummyDisplay::new();
        assert_eq!(d.frame_bytes(), 256);
        d.draw(&[0xAA; 256])?;
        assert!(d.draw(&[0; 255]).is_err());
        assert_eq!(d.frames.len(), 1);
        assert_eq!(d.frames[0][0], 0xAA);
        Ok(())
    }
}
