mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use voicetag_core::models::config::CardRemovalPolicy;
use voicetag_core::storage::{metadata, wav_reader};
use voicetag_core::traits::card_reader::CardReader;
use voicetag_core::{
    PlaybackReport, RecorderController, RecorderError, RecordingResult, SessionDelegate, SessionState,
};
use voicetag_sim::{load_script, MicSignal, ScriptedCardReader, SimSettings, SimulatedHardware};

use cli::{Args, Command};

/// How often the session loop looks at the controller.
const SESSION_TICK: Duration = Duration::from_millis(50);

/// Stands in for the display task: every notification goes to the log.
struct LoggingDelegate;

impl SessionDelegate for LoggingDelegate {
    fn on_state_changed(&self, state: &SessionState) {
        match state.card() {
            Some(uid) => log::info!("State: {} (card {})", state.label(), uid),
            None => log::info!("State: {}", state.label()),
        }
    }

    fn on_error(&self, error: &RecorderError) {
        log::error!("Recorder error: {}", error);
    }

    fn on_recording_finished(&self, result: &RecordingResult) {
        log::info!(
            "Recording finished: {} ({:.2} s)",
            result.file_path.display(),
            result.duration_secs
        );
    }

    fn on_playback_finished(&self, report: &PlaybackReport) {
        log::info!(
            "Playback finished: {} ({:.2} s)",
            report.file_path.display(),
            report.duration_secs()
        );
    }

    fn on_recordings_changed(&self, recordings: &[PathBuf]) {
        log::info!("{} recording(s) on card", recordings.len());
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    cli::init_logging(&args);

    let settings = build_settings(&args)?;
    let hardware = Arc::new(SimulatedHardware::new(settings.microphone));
    let mut controller =
        RecorderController::new(Arc::clone(&hardware), settings.recorder).context("failed to start recorder")?;
    controller.set_delegate(Arc::new(LoggingDelegate));
    let controller = Arc::new(controller);

    match args.command {
        Command::Record { name, seconds } => record(&controller, &name, seconds),
        Command::Play { file } => {
            let report = controller.play(&file)?;
            let stats = hardware.speaker_stats();
            println!(
                "played {} ({}, {:.2} s{}), speaker peak {}",
                report.file_path.display(),
                report.source_format,
                report.duration_secs(),
                if report.reconfigured { ", clock reconfigured" } else { "" },
                stats.peak
            );
            Ok(())
        }
        Command::List => list(&controller),
        Command::Delete { file } => {
            let path = resolve_existing(&controller, &file);
            controller.delete_recording(&path)?;
            println!("deleted {}", path.display());
            Ok(())
        }
        Command::Session { script, confirm, .. } => session(&controller, &script, confirm),
    }
}

/// Settings file, then command-line overrides, then validation.
fn build_settings(args: &Args) -> Result<SimSettings> {
    let mut settings = SimSettings::load(args.config.as_deref())?;

    if let Some(dir) = &args.output_dir {
        settings.recorder.output_directory = dir.clone();
    }
    if let Some(volume) = args.volume {
        settings.recorder.volume = volume;
    }
    if let Some(frequency_hz) = args.tone {
        settings.microphone = MicSignal::Tone {
            frequency_hz,
            amplitude: 0.01,
        };
    }
    if let Command::Session {
        auto_start,
        stop_on_removal,
        ..
    } = &args.command
    {
        settings.recorder.auto_start |= *auto_start;
        if *stop_on_removal {
            settings.recorder.card_removal = CardRemovalPolicy::StopRecording;
        }
    }

    settings.validate()?;
    std::fs::create_dir_all(&settings.recorder.output_directory).with_context(|| {
        format!(
            "failed to create {}",
            settings.recorder.output_directory.display()
        )
    })?;
    Ok(settings)
}

fn record(controller: &RecorderController<SimulatedHardware>, name: &str, seconds: f64) -> Result<()> {
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("recording length must be positive, got {}", seconds);
    }
    let path = controller.start_recording(name)?;
    println!("recording to {} for {:.1} s", path.display(), seconds);
    thread::sleep(Duration::from_secs_f64(seconds));

    let result = controller
        .stop_recording()?
        .context("recording was not running")?;
    print_result(&result);
    Ok(())
}

fn list(controller: &RecorderController<SimulatedHardware>) -> Result<()> {
    let recordings = controller.list_recordings()?;
    if recordings.is_empty() {
        println!("no recordings in {}", controller.config().output_directory.display());
    }
    for path in recordings {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        match metadata::read_metadata(&path) {
            Ok(meta) => println!(
                "{}  {:.2} s  card {}",
                name,
                meta.duration_secs,
                meta.card_uid.as_deref().unwrap_or("-")
            ),
            Err(_) => match wav_reader::read_header(&path) {
                Ok(format) => println!("{}  {}", name, format),
                Err(e) => println!("{}  unreadable: {}", name, e),
            },
        }
    }
    Ok(())
}

fn session(controller: &Arc<RecorderController<SimulatedHardware>>, script: &Path, confirm: bool) -> Result<()> {
    let steps = load_script(script)?;
    let mut reader = ScriptedCardReader::new(steps);
    reader.init(controller.presence_callback())?;

    loop {
        controller.poll();
        if confirm && matches!(controller.state(), SessionState::CardDetected { .. }) {
            if let Err(e) = controller.confirm() {
                log::warn!("Confirm failed: {}", e);
            }
        }
        if reader.is_finished() {
            break;
        }
        thread::sleep(SESSION_TICK);
    }
    reader.shutdown()?;

    if let Some(result) = controller.stop_recording()? {
        print_result(&result);
    }
    println!("{} recording(s) on card", controller.list_recordings()?.len());
    Ok(())
}

fn print_result(result: &RecordingResult) {
    println!(
        "saved {} ({:.2} s, {} data bytes, sha256 {})",
        result.file_path.display(),
        result.duration_secs,
        result.data_size,
        result.checksum
    );
    if let Some(e) = &result.interrupted {
        println!("recording was cut short: {}", e);
    }
}

/// Bare file names refer to the recordings directory.
fn resolve_existing(controller: &RecorderController<SimulatedHardware>, file: &Path) -> PathBuf {
    if file.exists() || file.is_absolute() {
        file.to_path_buf()
    } else {
        controller.config().output_directory.join(file)
    }
}
