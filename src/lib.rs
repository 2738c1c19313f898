//! CHIP-8 virtual machine, with a terminal front end
//!
//! ## Design
//!
//! * the machine is one owned value, `Chip8Interpreter`; no globals
//! * `step()` runs one instruction, `tick()` runs the 60Hz timers; the host
//!   decides the ratio
//! * abstract display so can plug alternatives; starting with TUI in-console
//! * abstract input and sound the same way; the machine only ever sees a
//!   snapshot of 16 key states
//! * behaviour that differs between historical interpreters is a named quirk
//!   in `config::Quirks`, not a silent choice
//!
//! Model
//!
//! Environment
//!  |-- display, input, sound, settings
//!  |-- interpreter(config)
//!  |    |-- memory bus, registers, call stack, framebuffer, timers, keypad
//!  |    `-- instruction decoder
//!  `-- main loop, once per frame
//!       |-- interpreter.set_keys(input.key_state())
//!       |-- interpreter.step() x (instructions per second / frame rate)
//!       |     // a key wait ends the frame's steps early; keys can't change
//!       |     // until next frame anyway
//!       |-- interpreter.tick() x (60 / frame rate), remainder carried over
//!       |-- display.draw(framebuffer) if anything drew
//!       `-- sound.update(sound timer > 0)

pub mod config;
pub mod display;
pub mod environment;
pub mod error;
pub mod framebuffer;
pub mod input;
pub mod instruction;
pub mod interpreter;
pub mod memory;
pub mod opcode;
pub mod registers;
pub mod sound;
pub mod stack;
pub mod timer;

pub use config::{AddressMode, MachineConfig, Quirks, Settings};
pub use error::MachineError;
pub use interpreter::{Chip8Interpreter, Cycle, MachineState};
