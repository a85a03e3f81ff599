//! pmfplay CLI: inspect, convert, render and play tracker modules.
//!
//! Usage:
//!   pmf-cli info <file>
//!   pmf-cli convert <in> <out.pmf>
//!   pmf-cli render <file> <out.wav> [--seconds N] [--rate HZ] [--mono] [--linear]
//!   pmf-cli play <file>
//!
//! Set `RUST_LOG=debug` for loader diagnostics.

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use std::{env, fs};

use pmf_master::{Interpolation, LivePlayback, OutputChannels, OutputConfig, Player, Song};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage:
  pmf-cli info <file>
  pmf-cli convert <in> <out.pmf>
  pmf-cli render <file> <out.wav> [--seconds N] [--rate HZ] [--mono] [--linear]
  pmf-cli play <file>";

const DEFAULT_SECONDS: u32 = 300;
const DEFAULT_RATE: u32 = 44100;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let Some((command, rest)) = args.split_first() else {
        return Err(USAGE.into());
    };
    let opts = Options::parse(rest)?;
    match (command.as_str(), opts.positional.as_slice()) {
        ("info", [path]) => info(path),
        ("convert", [input, output]) => convert(input, output),
        ("render", [input, output]) => render(input, output, &opts),
        ("play", [path]) => play(path),
        _ => Err(USAGE.into()),
    }
}

struct Options {
    positional: Vec<String>,
    seconds: u32,
    rate: u32,
    mono: bool,
    linear: bool,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut opts = Options {
            positional: Vec::new(),
            seconds: DEFAULT_SECONDS,
            rate: DEFAULT_RATE,
            mono: false,
            linear: false,
        };
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--seconds" => opts.seconds = number(arg, iter.next())?,
                "--rate" => opts.rate = number(arg, iter.next())?,
                "--mono" => opts.mono = true,
                "--linear" => opts.linear = true,
                flag if flag.starts_with("--") => return Err(format!("unknown option {flag}\n{USAGE}")),
                _ => opts.positional.push(arg.clone()),
            }
        }
        if opts.rate == 0 {
            return Err("--rate must be above 0".into());
        }
        Ok(opts)
    }
}

fn number(flag: &str, value: Option<&String>) -> Result<u32, String> {
    let value = value.ok_or_else(|| format!("{flag} needs a value"))?;
    value
        .parse()
        .map_err(|_| format!("{flag}: '{value}' is not a number"))
}

fn load(path: &str) -> Result<(Vec<u8>, Song), String> {
    let data = fs::read(path).map_err(|e| format!("Failed to read {path}: {e}"))?;
    let song = pmf_formats::decode(&data).map_err(|e| format!("Failed to load {path}: {e}"))?;
    Ok((data, song))
}

fn info(path: &str) -> Result<(), String> {
    let (data, song) = load(path)?;
    let format = pmf_formats::detect(&data).map_or("?", |f| f.name());
    println!("Title:       {}", song.title);
    println!("Format:      {format}");
    println!("Channels:    {}", song.channels.len());
    println!("Patterns:    {}", song.patterns.len());
    println!("Orders:      {}", song.order.len());
    match song.restart {
        Some(order) => println!("Restart:     order {order}"),
        None => println!("Restart:     none"),
    }
    println!("Tempo:       {} BPM, Speed: {}", song.initial_tempo, song.initial_speed);
    println!("Volume:      {}", song.global_volume);
    println!("Instruments: {}", song.instruments.len());
    let samples_with_data = song.samples.iter().filter(|s| !s.is_empty()).count();
    println!("Samples:     {} ({} with data)", song.samples.len(), samples_with_data);
    Ok(())
}

fn convert(input: &str, output: &str) -> Result<(), String> {
    let (_, song) = load(input)?;
    let bytes = pmf_formats::pmf::encode(&song).map_err(|e| format!("Failed to encode {input}: {e}"))?;
    fs::write(output, &bytes).map_err(|e| format!("Failed to write {output}: {e}"))?;
    log::info!("converted {input} to {output}");
    println!("Wrote {} bytes to {output}", bytes.len());
    Ok(())
}

fn render(input: &str, output: &str, opts: &Options) -> Result<(), String> {
    let (_, song) = load(input)?;
    let config = OutputConfig {
        sample_rate: opts.rate,
        channels: if opts.mono {
            OutputChannels::Mono
        } else {
            OutputChannels::Stereo
        },
        interpolation: if opts.linear {
            Interpolation::Linear
        } else {
            Interpolation::Nearest
        },
        ..OutputConfig::default()
    };

    let (mut player, _control) = Player::new(config);
    player.load_song(song).map_err(|e| format!("Failed to load {input}: {e}"))?;
    player
        .start()
        .map_err(|_| "engine command queue is full".to_string())?;

    println!("Rendering to {output} at {} Hz...", opts.rate);
    let max_frames = opts.seconds as usize * opts.rate as usize;
    let frames = player
        .render_to_wav(output, max_frames)
        .map_err(|e| format!("Failed to write {output}: {e}"))?;
    println!(
        "Rendered {frames} frames ({:.1} s)",
        frames as f64 / opts.rate as f64
    );
    Ok(())
}

fn play(path: &str) -> Result<(), String> {
    let (_, song) = load(path)?;
    let mut live = LivePlayback::start(song, OutputConfig::default()).map_err(|e| e.to_string())?;
    println!("Playing...");
    println!();

    while !live.is_finished() {
        let (order, row) = live.control().position();
        print!("\rOrd: {order:02X} | Row: {row:02X}");
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(10));
    }

    live.stop().map_err(|e| e.to_string())?;
    println!("\rDone.          ");
    Ok(())
}
