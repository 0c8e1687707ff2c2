mod session;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossbeam_channel::Select;
use keybed_core::{KeybedConfig, PedalState};
use keybed_layout::{compute_geometry, KeyIndex, KeyboardGeometry, Point, SizingMode, KEY_COUNT};
use keybed_midi::{MidiSettings, MidirTransport};
use tracing_subscriber::EnvFilter;

use crate::session::{print_listing, Session};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = KeybedConfig::discover(cli.config.as_deref())?;
    match cli.command {
        Commands::Geometry(args) => execute_geometry(&config, args),
        Commands::Locate(args) => execute_locate(&config, args),
        Commands::Ports => execute_ports(&config),
        Commands::Monitor(args) => execute_monitor(config, args),
        Commands::Play(args) => execute_play(config, args),
    }
}

#[derive(Parser)]
#[command(author, version, about = "88-key keyboard geometry and MIDI tools")]
struct Cli {
    /// Settings file (JSON). Defaults to the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the key rectangles for a surface size.
    Geometry(GeometryArgs),
    /// Resolve a point on the surface to a key.
    Locate(LocateArgs),
    /// List the MIDI ports reported by the system.
    Ports,
    /// Print key and pedal changes received from connected devices.
    Monitor(MonitorArgs),
    /// Play a glissando over the given keys on every connected output.
    Play(PlayArgs),
}

#[derive(Args)]
struct SurfaceArgs {
    #[arg(long)]
    width: f32,
    #[arg(long)]
    height: f32,
    /// Alignment unit; defaults to the configured one.
    #[arg(long)]
    unit: Option<f32>,
    /// Sizing mode; defaults to the configured one.
    #[arg(long, value_enum)]
    mode: Option<Mode>,
}

impl SurfaceArgs {
    fn compute(&self, config: &KeybedConfig) -> KeyboardGeometry {
        let unit = self.unit.unwrap_or(config.layout.min_pixel_unit);
        let mode = self.mode.map(SizingMode::from).unwrap_or(config.layout.mode);
        compute_geometry(self.width, self.height, unit, mode)
    }
}

#[derive(Args)]
struct GeometryArgs {
    #[command(flatten)]
    surface: SurfaceArgs,
    /// Emit the full geometry as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct LocateArgs {
    #[command(flatten)]
    surface: SurfaceArgs,
    #[arg(long, allow_negative_numbers = true)]
    x: f32,
    #[arg(long, allow_negative_numbers = true)]
    y: f32,
}

/// Overrides for the configured MIDI settings.
#[derive(Args)]
struct MidiArgs {
    /// Client name registered with the system.
    #[arg(long)]
    client_name: Option<String>,
    /// Only connect inputs whose name contains this text.
    #[arg(long)]
    input: Option<String>,
    /// Only connect outputs whose name contains this text.
    #[arg(long)]
    output: Option<String>,
    /// Outbound MIDI channel, 0-15.
    #[arg(long)]
    channel: Option<u8>,
    /// Publish virtual ports named after the client.
    #[arg(long)]
    virtual_ports: bool,
}

impl MidiArgs {
    fn apply(self, mut settings: MidiSettings) -> MidiSettings {
        if let Some(name) = self.client_name {
            settings = settings.with_client_name(name);
        }
        if let Some(filter) = self.input {
            settings = settings.with_input_filter(filter);
        }
        if let Some(filter) = self.output {
            settings = settings.with_output_filter(filter);
        }
        if let Some(channel) = self.channel {
            settings = settings.with_output_channel(channel);
        }
        if self.virtual_ports {
            settings = settings.with_virtual_ports(true);
        }
        settings
    }
}

#[derive(Args)]
struct MonitorArgs {
    #[command(flatten)]
    midi: MidiArgs,
    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    seconds: Option<f64>,
}

#[derive(Args)]
struct PlayArgs {
    #[command(flatten)]
    midi: MidiArgs,
    /// Key indices (0 = A0, 87 = C8), in playing order.
    #[arg(long, value_delimiter = ',', required = true)]
    keys: Vec<usize>,
    /// Time each key is held.
    #[arg(long, default_value_t = 150)]
    step_ms: u64,
    /// Hold the damper pedal for the whole glissando.
    #[arg(long)]
    damper: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    ExactFit,
    PreferredAspect,
}

impl From<Mode> for SizingMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::ExactFit => SizingMode::ExactFit,
            Mode::PreferredAspect => SizingMode::PreferredAspect,
        }
    }
}

fn execute_geometry(config: &KeybedConfig, args: GeometryArgs) -> Result<()> {
    let geometry = args.surface.compute(config);
    if args.json {
        let json = serde_json::to_string_pretty(&geometry).context("failed to encode geometry")?;
        println!("{json}");
        return Ok(());
    }

    let (start, end) = geometry.span();
    println!(
        "gap {} | white {:.3} x {} | black {} x {} | span {start}..{end}",
        geometry.gap(),
        geometry.white_key_width(),
        geometry.white_key_length(),
        geometry.params().black_key_width,
        geometry.black_key_length(),
    );
    for key in KeyIndex::all() {
        let rect = geometry.key(key);
        println!(
            "{:>2} {:<4} {} top {:>8.2}..{:<8.2} bottom {:>8.2}..{:<8.2}",
            key.get(),
            key.to_string(),
            if rect.is_black { "black" } else { "white" },
            rect.top_left,
            rect.top_right,
            rect.bottom_left,
            rect.bottom_right,
        );
    }
    Ok(())
}

fn execute_locate(config: &KeybedConfig, args: LocateArgs) -> Result<()> {
    let geometry = args.surface.compute(config);
    let key = geometry.locate(Point::new(args.x, args.y));
    println!("{} {key} (note {})", key.get(), key.note());
    Ok(())
}

fn execute_ports(config: &KeybedConfig) -> Result<()> {
    let listing = MidirTransport::list_ports(&config.midi.client_name)?;
    print_listing(&listing);
    Ok(())
}

fn execute_monitor(config: KeybedConfig, args: MonitorArgs) -> Result<()> {
    let midi = args.midi.apply(config.midi.clone());
    let config = config.with_midi(midi);
    let session = Session::open(&config)?;
    for (id, name) in session.transport().inputs() {
        println!("listening on {name} ({id})");
    }

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("failed to install Ctrl-C handler")?;

    let handle = session.handle();
    let keys = KeyIndex::all()
        .map(|key| handle.subscribe_key(key))
        .collect::<Result<Vec<_>, _>>()?;
    let pedals = handle.subscribe_pedals()?;

    let mut select = Select::new();
    for rx in &keys {
        select.recv(rx);
    }
    let pedal_op = select.recv(&pedals);
    let stop_op = select.recv(&stop_rx);

    let deadline = args
        .seconds
        .filter(|seconds| seconds.is_finite())
        .map(|seconds| Instant::now() + Duration::from_secs_f64(seconds.max(0.0)));
    let mut pressed = [false; KEY_COUNT];
    let mut pedal_state = PedalState::default();
    loop {
        let operation = match deadline {
            Some(deadline) => match select.select_deadline(deadline) {
                Ok(operation) => operation,
                Err(_) => break,
            },
            None => select.select(),
        };
        let index = operation.index();
        if index == stop_op {
            let _ = operation.recv(&stop_rx);
            break;
        }
        if index == pedal_op {
            let state = operation.recv(&pedals)?;
            if state != pedal_state {
                println!("damper {} soft {}", on_off(state.damper), on_off(state.soft));
                pedal_state = state;
            }
            continue;
        }
        let is_down = operation.recv(&keys[index])?;
        if pressed[index] != is_down {
            pressed[index] = is_down;
            let key = KeyIndex::new(index).ok_or_else(|| anyhow!("no key at {index}"))?;
            println!("{:<4} {}", key.to_string(), if is_down { "down" } else { "up" });
        }
    }

    if let Some(model) = session.close() {
        if model.malformed_total() > 0 {
            println!("{} malformed messages dropped", model.malformed_total());
        }
    }
    Ok(())
}

fn execute_play(config: KeybedConfig, args: PlayArgs) -> Result<()> {
    let midi = args.midi.apply(config.midi.clone());
    let config = config.with_midi(midi);
    let keys = args
        .keys
        .iter()
        .map(|&index| {
            KeyIndex::new(index).ok_or_else(|| anyhow!("key index {index} is outside 0..88"))
        })
        .collect::<Result<Vec<_>>>()?;

    let session = Session::open(&config)?;
    let outputs = session.transport().outputs();
    if outputs.is_empty() {
        println!("No MIDI outputs connected; nothing will be heard.");
    }
    for (id, name) in &outputs {
        println!("playing on {name} ({id})");
    }

    let handle = session.handle();
    let step = Duration::from_millis(args.step_ms);
    if args.damper {
        handle.set_pedal(keybed_midi::Pedal::Damper, true)?;
    }
    for key in keys {
        handle.glissando_to(key)?;
        thread::sleep(step);
    }
    handle.end_glissando()?;
    handle.reset()?;
    session.close();
    Ok(())
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
