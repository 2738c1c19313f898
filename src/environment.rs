use spin_sleep::LoopHelper;
use std::error::Error;

use crate::config::{Settings, TIMER_HZ};
use crate::display::Display;
use crate::input::Input;
use crate::interpreter::{Chip8Interpreter, Cycle};
use crate::sound::Sound;

/// Why the main loop stopped, when it stopped cleanly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Quit,
    FrameLimit,
}

/// Sets up the machine's surroundings and runs the main loop. Each frame:
///  - read the keys and hand them to the machine
///  - run as many instructions as the instruction rate allows, carrying
///    fractions over to the next frame
///  - tick the timers at 60Hz, however many frames that takes
///  - render if anything drew, and follow the sound timer
pub struct Environment<'a> {
    interpreter: Chip8Interpreter,
    display: &'a mut dyn Display,
    input: &'a mut dyn Input,
    sound: &'a mut dyn Sound,
    settings: Settings,
    budget: f64,
    /// owed timer ticks, in units of 1 / (TIMER_HZ * frame_rate) seconds
    tick_budget: u32,
    frames: u64,
}

impl<'a> Environment<'a> {
    pub fn new(
        interpreter: Chip8Interpreter,
        display: &'a mut dyn Display,
        input: &'a mut dyn Input,
        sound: &'a mut dyn Sound,
        settings: Settings,
    ) -> Self {
        Environment {
            interpreter,
            display,
            input,
            sound,
            settings,
            budget: 0.0,
            tick_budget: 0,
            frames: 0,
        }
    }

    pub fn interpreter(&self) -> &Chip8Interpreter {
        &self.interpreter
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// run at the configured frame rate until the user quits, the machine
    /// halts, or `max_frames` have been played
    pub fn main_loop(&mut self, max_frames: Option<u64>) -> Result<RunOutcome, Box<dyn Error>> {
        let mut pacing =
            LoopHelper::builder().build_with_target_rate(f64::from(self.settings.frame_rate));
        self.display.draw(self.interpreter.framebuffer().as_bytes())?;

        let outcome = loop {
            pacing.loop_start();
            if max_frames.map_or(false, |max| self.frames >= max) {
                break Ok(RunOutcome::FrameLimit);
            }
            if let Err(e) = self.frame() {
                break Err(e);
            }
            if self.input.quit_requested() {
                break Ok(RunOutcome::Quit);
            }
            pacing.loop_sleep();
        };

        if let Err(e) = self.sound.update(false) {
            log::warn!("couldn't silence sound: {}", e);
        }
        log::debug!("main loop finished after {} frames", self.frames);
        outcome
    }

    /// one 60Hz (or whatever the frame rate is) slice of emulation
    pub fn frame(&mut self) -> Result<(), Box<dyn Error>> {
        let keys = self.input.key_state()?;
        if self.input.quit_requested() {
            return Ok(());
        }
        self.interpreter.set_keys(keys);

        self.budget += self.settings.steps_per_frame();
        let steps = self.budget.floor();
        self.budget -= steps;

        let mut redraw = false;
        for _ in 0..steps as u64 {
            match self.interpreter.step()? {
                Cycle::Continue => {}
                Cycle::Redraw => redraw = true,
                // the keys won't change again until next frame
                Cycle::AwaitingKey => break,
            }
        }

        let frame_rate = self.settings.frame_rate.max(1);
        self.tick_budget += TIMER_HZ;
        while self.tick_budget >= frame_rate {
            self.tick_budget -= frame_rate;
            self.interpreter.tick();
        }
        if redraw {
            self.display.draw(self.interpreter.framebuffer().as_bytes())?;
        }
        if let Err(e) = self.sound.update(self.interpreter.sound_active()) {
            log::warn!("sound device failed: {}", e);
        }
        self.frames += 1;
        Ok(())
    }
}
