use anyhow::{Context, Result};
use pocket::app::Player;
use pocket::audio::RodioAudioEngine;
use pocket::clock::{Clock, SystemClock};
use pocket::config;
use pocket::display::TerminalDisplay;
use pocket::input::TerminalInput;
use pocket::library::{LibraryIndex, LoftyMetadata};
use pocket::scroll::FontMetrics;
use pocket::volume::AmixerVolumeSink;
use std::fs::{self, File};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    folder: Option<PathBuf>,
    help: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("pocket-player: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    if args.help {
        print_help();
        return Ok(());
    }

    init_logging();
    let config = config::load_config()?;
    let folder = args.folder.unwrap_or_else(|| config.music_dir.clone());

    let library = LibraryIndex::build(&folder, &LoftyMetadata)
        .with_context(|| format!("cannot build music library from {}", folder.display()))?;

    let engine = RodioAudioEngine::new()?;
    let clock: Rc<dyn Clock> = Rc::new(SystemClock::new());
    let display = TerminalDisplay::new(FontMetrics::SMALL)?;
    let mut player = Player::new(
        &config,
        Rc::new(library),
        engine,
        TerminalInput::new(),
        display,
        AmixerVolumeSink::new(config.mixer_control.clone()),
        clock,
    );
    player.run(config.tick_interval())
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("POCKET_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info,pocket=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_ansi(false);

    match open_log_file() {
        Ok(file) => builder.with_writer(Mutex::new(file)).init(),
        Err(err) => {
            builder.with_writer(std::io::stderr).init();
            tracing::warn!("logging to stderr: {err:#}");
        }
    }
}

fn open_log_file() -> Result<File> {
    let path = config::log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    File::options()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

fn parse_args(args: Vec<String>) -> Result<CliArgs> {
    let mut out = CliArgs::default();
    for arg in args {
        match arg.as_str() {
            "-h" | "--help" => out.help = true,
            flag if flag.starts_with('-') => anyhow::bail!("unknown argument {flag}"),
            folder => {
                if out.folder.is_some() {
                    anyhow::bail!("only one music folder may be given");
                }
                out.folder = Some(PathBuf::from(folder));
            }
        }
    }
    Ok(out)
}

fn print_help() {
    println!("pocket-player [MUSIC_DIR]");
    println!("  MUSIC_DIR     Folder with .mp3/.wav/.flac files (default from config.json)");
    println!("  -h, --help    Show this help");
    println!();
    println!("Keys: Up/Down or wheel = encoder, Enter = select, u = up, Space/d = down,");
    println!("      Left/Right = previous/next, r/Backspace = back, q = quit");
}
