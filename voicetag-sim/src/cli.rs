//! Command-line interface for the voicetag simulator
//!
//! Handles argument parsing and logging configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

/// voicetag - RFID-triggered voice recorder, simulated on the host
#[derive(Parser, Debug)]
#[command(name = "voicetag")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// TOML settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Recordings directory (overrides the settings file)
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Playback volume (overrides the settings file)
    #[arg(long, global = true)]
    pub volume: Option<f32>,

    /// Feed the microphone a sine tone at this frequency instead of the configured signal
    #[arg(long, global = true)]
    pub tone: Option<f64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Record for a fixed time
    Record {
        /// File name inside the recordings directory
        name: String,

        /// Seconds to record
        #[arg(short, long, default_value_t = 2.0)]
        seconds: f64,
    },

    /// Play a WAV file through the simulated speaker
    Play { file: PathBuf },

    /// List recordings, newest first
    List,

    /// Delete a recording and its metadata
    Delete { file: PathBuf },

    /// Replay a card script against the session state machine
    Session {
        /// Card script file
        script: PathBuf,

        /// Confirm every detected card as the UI would
        #[arg(long)]
        confirm: bool,

        /// Start recording on card arrival without confirmation
        #[arg(long)]
        auto_start: bool,

        /// Stop recording when the card leaves the reader
        #[arg(long)]
        stop_on_removal: bool,
    },
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Dependencies stay at warn
    builder.filter_level(LevelFilter::Warn);

    builder.filter_module("voicetag", args.log_level());
    builder.filter_module("voicetag_core", args.log_level());
    builder.filter_module("voicetag_sim", args.log_level());

    builder.format_timestamp_millis().init();
}
