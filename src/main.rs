use std::{
    path::{Path, PathBuf},
    process,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
};

use clap::{Parser, Subcommand};
use log::{LevelFilter, error, info};
#[cfg(windows)]
use shiftindicator::telemetry::IRacingTelemetrySource;
use shiftindicator::{
    LogAudioSink, PollLoop, ReplayTelemetrySource, ShiftIndicatorError, TelemetryRecord,
    TelemetrySource,
    advisor::LoopConfig,
    audio::{AudioSink, CpalAudioSink, SoundClip},
    config::{LoadedSettings, Settings},
    writer,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Settings file, instead of searching the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the configured vehicles and their shiftpoints
    Shiftpoints,
    /// Play the alert sound once
    Play,
    /// Advise shifts from the running simulator
    Run {
        /// Record the telemetry to a JSON Lines file
        #[arg(short, long)]
        record: Option<PathBuf>,

        /// Log alerts instead of playing the sound
        #[arg(short, long)]
        mute: bool,
    },
    /// Advise shifts from a recorded session
    Replay {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        mute: bool,
    },
}

fn shiftpoints(loaded: &LoadedSettings) {
    let table = &loaded.settings.shiftpoints;
    println!("{} vehicle(s) in {}", table.len(), loaded.path.display());
    for line in table.describe() {
        println!("  {}", line);
    }
}

fn load_clip(loaded: &LoadedSettings) -> Result<SoundClip, ShiftIndicatorError> {
    let sound_path = loaded.settings.sound_path(&loaded.path)?;
    info!("Using alert sound {}", sound_path.display());
    SoundClip::decode(&sound_path)
}

fn play(loaded: &LoadedSettings) -> Result<(), ShiftIndicatorError> {
    let clip = load_clip(loaded)?;
    let duration = clip.duration();
    let mut sink = CpalAudioSink::new(clip, loaded.settings.volume)?;
    sink.play()?;
    thread::sleep(duration);
    Ok(())
}

fn audio_sink(
    loaded: &LoadedSettings,
    mute: bool,
) -> Result<Box<dyn AudioSink>, ShiftIndicatorError> {
    if mute {
        info!("Muted, alerts will only be logged");
        return Ok(Box::new(LogAudioSink::default()));
    }
    let clip = load_clip(loaded)?;
    Ok(Box::new(CpalAudioSink::new(clip, loaded.settings.volume)?))
}

fn advise<S: TelemetrySource>(
    loaded: &LoadedSettings,
    source: S,
    mute: bool,
    record: Option<&Path>,
    shutdown: &AtomicBool,
) -> Result<(), ShiftIndicatorError> {
    let sink = audio_sink(loaded, mute)?;
    let config = LoopConfig::from(&loaded.settings);

    // the writer thread ends once the loop drops its sender
    let (record_tx, writer_handle) = match record {
        Some(output_file) => {
            let (record_tx, record_rx) = mpsc::channel::<TelemetryRecord>();
            let output_file = output_file.to_path_buf();
            let handle = thread::spawn(move || writer::write_records(&output_file, record_rx));
            (Some(record_tx), Some(handle))
        }
        None => (None, None),
    };

    let mut poll_loop = PollLoop::new(source, sink, &loaded.settings.shiftpoints, config);
    if let Some(record_tx) = record_tx {
        poll_loop = poll_loop.record_to(record_tx);
    }

    let result = poll_loop.run(shutdown);
    drop(poll_loop);

    if let Some(handle) = writer_handle {
        match handle.join() {
            Ok(Err(e)) => error!("Recording failed: {}", e),
            Err(_) => error!("Recording thread panicked"),
            Ok(Ok(_)) => {}
        }
    }

    let summary = result?;
    info!(
        "{} alert(s) over {} session(s), {} disconnect(s)",
        summary.alerts, summary.sessions, summary.disconnects
    );
    Ok(())
}

#[cfg(windows)]
fn run(
    loaded: &LoadedSettings,
    mute: bool,
    record: Option<&Path>,
    shutdown: &AtomicBool,
) -> Result<(), ShiftIndicatorError> {
    let source = IRacingTelemetrySource::new()?;
    advise(loaded, source, mute, record, shutdown)
}

#[cfg(not(windows))]
fn run(
    _loaded: &LoadedSettings,
    _mute: bool,
    _record: Option<&Path>,
    _shutdown: &AtomicBool,
) -> Result<(), ShiftIndicatorError> {
    Err(ShiftIndicatorError::TelemetryConnectionError {
        description: "live telemetry is only available on Windows, use `replay` instead"
            .to_string(),
    })
}

fn execute(cli: &Args, shutdown: &AtomicBool) -> Result<(), ShiftIndicatorError> {
    let loaded = Settings::load(cli.config.as_deref())?;
    info!("Loaded settings from {}", loaded.path.display());

    match &cli.command {
        Some(Commands::Shiftpoints) => {
            shiftpoints(&loaded);
            Ok(())
        }
        Some(Commands::Play) => play(&loaded),
        Some(Commands::Run { record, mute }) => {
            run(&loaded, *mute, record.as_deref(), shutdown)
        }
        None => run(&loaded, false, None, shutdown),
        Some(Commands::Replay { input, mute }) => {
            let source = ReplayTelemetrySource::from_file(input)?;
            advise(&loaded, source, *mute, None, shutdown)
        }
    }
}

fn main() {
    let cli = Args::parse();
    colog::default_builder()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!("Exiting...");
        handler_flag.store(true, Ordering::SeqCst);
    }) {
        error!("Could not set Ctrl-C handler: {}", e);
    }

    if let Err(e) = execute(&cli, &shutdown) {
        error!("{}", e);
        process::exit(1);
    }
}
