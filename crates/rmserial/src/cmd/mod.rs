use clap::{Args, Subcommand, ValueEnum};
use rmserial_transport::{FlowControl, Parity, StopBits};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the bridge on a serial device.
    Run(RunArgs),
    /// Decode a hex byte stream into frames.
    Decode(DecodeArgs),
    /// Build a sealed frame and print it.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON bridge configuration file. Flags below override its values.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Serial device path.
    #[arg(long, short = 'd', env = "RMSERIAL_DEVICE")]
    pub device: Option<String>,
    /// Line speed.
    #[arg(long)]
    pub baud_rate: Option<u32>,
    /// Flow control: none, hardware or software.
    #[arg(long)]
    pub flow_control: Option<FlowControl>,
    /// Parity: none, odd or even.
    #[arg(long)]
    pub parity: Option<Parity>,
    /// Stop bits: 1, 1.5 or 2.
    #[arg(long)]
    pub stop_bits: Option<StopBits>,
    /// Wait between reopen attempts, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub reconnect_backoff_ms: Option<u64>,
    /// Print command latency as JSON lines on stdout.
    #[arg(long)]
    pub emit_latency: bool,
    /// File holding the detection color ("red" or "blue").
    #[arg(long, value_name = "FILE")]
    pub color_param: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DecodeKind {
    /// Controller-to-host frames (sentinel framed).
    Receive,
    /// Host-to-controller frames (back to back).
    Send,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame layout to decode.
    #[arg(long, value_enum, default_value = "receive")]
    pub kind: DecodeKind,
    /// Hex bytes; whitespace, ':' and ',' separators are ignored.
    #[arg(conflicts_with = "file")]
    pub hex: Vec<String>,
    /// Read hex from a file instead (stdin when neither is given).
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(subcommand)]
    pub command: EncodeCommand,
}

#[derive(Subcommand, Debug)]
pub enum EncodeCommand {
    /// Controller-to-host state frame.
    Receive(EncodeReceiveArgs),
    /// Host-to-controller command frame.
    Send(EncodeSendArgs),
}

#[derive(Args, Debug)]
pub struct EncodeReceiveArgs {
    /// Robot color wire value (0 red, 1 blue).
    #[arg(long, default_value_t = 0)]
    pub color: u8,
    /// Pitch in radians.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub pitch: f32,
    /// Yaw in radians.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub yaw: f32,
}

#[derive(Args, Debug)]
pub struct EncodeSendArgs {
    /// Set the target-found flag.
    #[arg(long)]
    pub found: bool,
    /// Set the target-color flag.
    #[arg(long)]
    pub target_color: bool,
    #[arg(long, default_value_t = 0)]
    pub task_mode: u8,
    /// Target position as x,y,z.
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = [0.0, 0.0, 0.0],
        allow_negative_numbers = true
    )]
    pub position: Vec<f32>,
    /// Target velocity as vx,vy,vz.
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = [0.0, 0.0, 0.0],
        allow_negative_numbers = true
    )]
    pub velocity: Vec<f32>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
