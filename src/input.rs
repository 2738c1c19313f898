use crossterm::event::{poll, read, Event, KeyCode, KeyModifiers};
use crossterm::terminal;
use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

pub const KEY_COUNT: usize = 16;

/// pressed/unpressed for each of the 16 hex keys
pub type KeyState = [bool; KEY_COUNT];

/// map of characters read from the keyboard to what the chip8 might expect
/// where '1' => 0x01 and 'a' => 0x0a
const CHIP8_LITERAL_KEYMAP: [(char, u8); 16] = [
    ('0', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('4', 0x04),
    ('5', 0x05),
    ('6', 0x06),
    ('7', 0x07),
    ('8', 0x08),
    ('9', 0x09),
    ('a', 0x0a),
    ('b', 0x0b),
    ('c', 0x0c),
    ('d', 0x0d),
    ('e', 0x0e),
    ('f', 0x0f),
];

/// ditto using left-hand side of qwerty keyboard
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); 16] = [
    ('x', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('z', 0x0a),
    ('c', 0x0b),
    ('4', 0x0c),
    ('r', 0x0d),
    ('f', 0x0e),
    ('v', 0x0f),
];

/// Which physical layout feeds the hex keypad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keymap {
    /// 1234/qwer/asdf/zxcv
    Conventional,
    /// the key labelled with the hex digit
    Literal,
}

impl Keymap {
    fn table(self) -> HashMap<char, u8> {
        match self {
            Keymap::Conventional => HashMap::from(CHIP8_CONVENTIONAL_KEYMAP),
            Keymap::Literal => HashMap::from(CHIP8_LITERAL_KEYMAP),
        }
    }
}

/// reads keypresses on behalf of the host
pub trait Input {
    /// the state of the 16 keys right now; called once per frame
    fn key_state(&mut self) -> Result<KeyState, io::Error>;

    /// whether the user has asked to leave
    fn quit_requested(&self) -> bool {
        false
    }
}

/// how long a terminal key counts as held after its last press event;
/// terminals report presses and auto-repeats but never releases
const STDIN_KEY_HOLD: Duration = Duration::from_millis(150);

/// simple implementation of Input, using crossterm events on STDIN
pub struct StdinInput {
    last_pressed: [Option<Instant>; KEY_COUNT],
    keymap: HashMap<char, u8>,
    quit: bool,
}

impl StdinInput {
    pub fn new(keymap: Keymap) -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        Ok(StdinInput {
            last_pressed: [None; KEY_COUNT],
            keymap: keymap.table(),
            quit: false,
        })
    }

    fn read_stdin(&mut self) -> Result<(), io::Error> {
        while poll(Duration::from_millis(0))? {
            match read()? {
                Event::Key(evt) => match evt.code {
                    KeyCode::Esc => self.quit = true,
                    KeyCode::Char('c') if evt.modifiers.contains(KeyModifiers::CONTROL) => {
                        self.quit = true
                    }
                    KeyCode::Char(key) => match self.keymap.get(&key.to_ascii_lowercase()) {
                        Some(mapped_key) => {
                            self.last_pressed[*mapped_key as usize] = Some(Instant::now())
                        }
                        None => {
                            log::debug!("can't map {:?} to a COSMAC key", key);
                        }
                    },
                    other => {
                        log::trace!("ignoring key event {:?}", other);
                    }
                },
                other => {
                    log::trace!("ignoring terminal event {:?}", other);
                }
            }
        }
        Ok(())
    }
}

impl Drop for StdinInput {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            log::error!("couldn't leave raw mode: {}", e);
        }
    }
}

impl Input for StdinInput {
    fn key_state(&mut self) -> Result<KeyState, io::Error> {
        self.read_stdin()?;
        let now = Instant::now();
        let mut keys = [false; KEY_COUNT];
        for (key, pressed) in keys.iter_mut().zip(self.last_pressed.iter()) {
            *key = matches!(pressed, Some(at) if now.duration_since(*at) < STDIN_KEY_HOLD);
        }
        Ok(keys)
    }

    fn quit_requested(&self) -> bool {
        self.quit
    }
}

/// dummy Input implementation for testing; replays a script of key states,
/// one per frame, then holds the last one
pub struct DummyInput {
    frames: Vec<KeyState>,
    next: usize,
    quit_after: Option<usize>,
}

impl DummyInput {
    pub fn new(keys: &[u8]) -> Self {
        let mut state = [false; KEY_COUNT];
        for key in keys {
            state[(key & 0x0f) as usize] = true;
        }
        DummyInput::scripted(vec![state])
    }

    pub fn scripted(frames: Vec<KeyState>) -> Self {
        DummyInput {
            frames,
            next: 0,
            quit_after: None,
        }
    }

    /// ask to quit when polled for the frame after `frames`
    pub fn quit_after(mut self, frames: usize) -> Self {
        self.quit_after = Some(frames);
        self
    }
}

impl Input for DummyInput {
    fn key_state(&mut self) -> Result<KeyState, io::Error> {
        let state = match self.frames.get(self.next) {
            Some(state) => *state,
            None => self.frames.last().copied().unwrap_or([false; KEY_COUNT]),
        };
        self.next += 1;
        Ok(state)
    }

    fn quit_requested(&self) -> bool {
        matches!(self.quit_after, Some(frames) if self.next > frames)
    }
}

/// The machine's view of the keypad: the latest snapshot supplied by the
/// host, and the one before it for edge detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputLatch {
    current: KeyState,
    previous: KeyState,
}

impl InputLatch {
    pub fn new() -> Self {
        InputLatch::default()
    }

    /// take a fresh snapshot from the host
    pub fn update(&mut self, keys: KeyState) {
        self.previous = self.current;
        self.current = keys;
    }

    /// only the low nibble of `key` is significant
    pub fn is_pressed(&self, key: u8) -> bool {
        self.current[(key & 0x0f) as usize]
    }

    /// lowest key that is down now but was up in the previous snapshot
    pub fn any_just_pressed(&self) -> Option<u8> {
        (0..KEY_COUNT)
            .find(|&k| self.current[k] && !self.previous[k])
            .map(|k| k as u8)
    }

    /// treat everything currently held as already seen, so only a fresh
    /// press satisfies a key wait
    pub fn arm(&mut self) {
        self.previous = self.current;
    }

    pub fn snapshot(&self) -> KeyState {
        self.current
    }
}
