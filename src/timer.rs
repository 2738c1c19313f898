/// The delay and sound timers. Both count down towards zero once per
/// `tick()`, which the host calls at 60Hz regardless of instruction rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerClock {
    pub delay: u8,
    pub sound: u8,
}

impl TimerClock {
    pub fn new() -> Self {
        TimerClock { delay: 0, sound: 0 }
    }

    pub fn tick(&mut self) {
        self.delay = self.delay.saturating_sub(1);
        self.sound = self.sound.saturating_sub(1);
    }

    /// the tone plays for as long as the sound timer is non-zero
    pub fn sound_active(&self) -> bool {
        self.sound > 0
    }
}
