use std::error::Error;
use std::fs::File;
use std::path::PathBuf;

use clap::Parser;

use chip8::config::{AddressMode, MachineConfig, Quirks, Settings};
use chip8::config::{DEFAULT_FRAME_RATE, DEFAULT_INSTRUCTIONS_PER_SECOND};
use chip8::display::MonoTermDisplay;
use chip8::environment::{Environment, RunOutcome};
use chip8::input::{Keymap, StdinInput};
use chip8::interpreter::Chip8Interpreter;
use chip8::sound::{Mute, SimpleBeep, Sound};

/// Run a CHIP-8 program in the terminal. Esc quits.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// program image, loaded at 0x200
    rom: PathBuf,

    /// Instructions per second
    #[arg(short, long, default_value_t = DEFAULT_INSTRUCTIONS_PER_SECOND)]
    ips: u32,

    /// Render rate in frames per second; timers always run at 60Hz
    #[arg(short, long, default_value_t = DEFAULT_FRAME_RATE)]
    frame_rate: u32,

    #[arg(long, help = "8XY6/8XYE shift VY into VX")]
    shift_uses_vy: bool,

    #[arg(long, help = "BNNN jumps to NNN + VX")]
    jump_uses_vx: bool,

    #[arg(long, help = "FX55/FX65 advance I past the registers")]
    load_store_increments_i: bool,

    #[arg(long, help = "FX1E sets VF when I passes 0xFFF")]
    add_to_i_sets_vf: bool,

    #[arg(long, help = "8XY1/8XY2/8XY3 zero VF")]
    logic_resets_vf: bool,

    #[arg(long, help = "Halt on unknown opcodes")]
    strict_opcodes: bool,

    #[arg(long, help = "Halt on memory access past 0xFFF instead of wrapping")]
    strict_addressing: bool,

    #[arg(short, long, help = "No sound")]
    mute: bool,

    #[arg(long, help = "Map keys 0-9 and a-f directly instead of the 1234/qwer/asdf/zxcv block")]
    literal_keys: bool,

    #[arg(long, help = "Seed the random number generator")]
    seed: Option<u64>,
}

impl Args {
    fn machine_config(&self) -> MachineConfig {
        MachineConfig {
            quirks: Quirks {
                shift_uses_vy: self.shift_uses_vy,
                jump_uses_vx: self.jump_uses_vx,
                load_store_increments_i: self.load_store_increments_i,
                add_to_i_sets_vf: self.add_to_i_sets_vf,
                logic_resets_vf: self.logic_resets_vf,
            },
            address_mode: if self.strict_addressing {
                AddressMode::Strict
            } else {
                AddressMode::Wrap
            },
            strict_opcodes: self.strict_opcodes,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args = Args::parse();

    // load the program before touching the terminal, so errors are readable
    let config = args.machine_config();
    let mut interpreter = match args.seed {
        Some(seed) => Chip8Interpreter::with_seed(config, seed),
        None => Chip8Interpreter::new(config),
    };
    let mut f = File::open(&args.rom)?;
    interpreter.load_program(&mut f)?;
    log::info!("loaded {}", args.rom.display());

    let mut display = MonoTermDisplay::chip8()?;
    let keymap = if args.literal_keys {
        Keymap::Literal
    } else {
        Keymap::Conventional
    };
    let mut input = StdinInput::new(keymap)?;
    let (mut beeper, mut mute) = (SimpleBeep::new(), Mute::new());
    let sound: &mut dyn Sound = if args.mute { &mut mute } else { &mut beeper };

    let settings = Settings::new(args.ips, args.frame_rate);
    let mut env = Environment::new(interpreter, &mut display, &mut input, sound, settings);
    let outcome = env.main_loop(None);
    let diagnostics = env.interpreter().diagnostics().len();
    drop(env);
    drop(input);
    drop(display);

    if diagnostics > 0 {
        log::warn!("skipped {} unknown opcodes", diagnostics);
    }
    if outcome? == RunOutcome::Quit {
        log::info!("quit");
    }
    Ok(())
}
