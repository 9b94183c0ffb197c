use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rmserial_frame::{ReceivePacket, SendPacket};
use rmserial_link::JointState;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Result of decoding one frame position in a byte stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DecodeOutcome {
    Receive {
        robot_color: u8,
        color: Option<String>,
        pitch: f32,
        yaw: f32,
        checksum: String,
    },
    Send {
        target_found: bool,
        target_color: bool,
        task_mode: u8,
        position: [f32; 3],
        velocity: [f32; 3],
        checksum: String,
    },
    InvalidHeader {
        byte: String,
    },
    CrcError {
        computed: String,
        received: String,
    },
}

impl DecodeOutcome {
    pub fn receive(packet: &ReceivePacket) -> Self {
        Self::Receive {
            robot_color: packet.robot_color,
            color: packet.color().map(|color| color.to_string()),
            pitch: packet.pitch,
            yaw: packet.yaw,
            checksum: format!("{:#06x}", packet.checksum),
        }
    }

    pub fn send(packet: &SendPacket) -> Self {
        Self::Send {
            target_found: packet.target_found,
            target_color: packet.target_color,
            task_mode: packet.task_mode,
            position: [packet.x, packet.y, packet.z],
            velocity: [packet.vx, packet.vy, packet.vz],
            checksum: format!("{:#06x}", packet.checksum),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Receive { .. } | Self::Send { .. })
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Receive { .. } => "receive",
            Self::Send { .. } => "send",
            Self::InvalidHeader { .. } => "invalid_header",
            Self::CrcError { .. } => "crc_error",
        }
    }

    fn summary(&self) -> String {
        match self {
            Self::Receive {
                robot_color,
                color,
                pitch,
                yaw,
                checksum,
            } => format!(
                "color={robot_color} ({}) pitch={pitch} yaw={yaw} crc={checksum}",
                color.as_deref().unwrap_or("unknown")
            ),
            Self::Send {
                target_found,
                target_color,
                task_mode,
                position,
                velocity,
                checksum,
            } => format!(
                "found={target_found} target_color={target_color} mode={task_mode} \
                 pos=({}, {}, {}) vel=({}, {}, {}) crc={checksum}",
                position[0], position[1], position[2], velocity[0], velocity[1], velocity[2]
            ),
            Self::InvalidHeader { byte } => format!("byte={byte}"),
            Self::CrcError { computed, received } => {
                format!("computed={computed} received={received}")
            }
        }
    }
}

/// One decoded record with its byte offset in the input.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeRecord {
    pub offset: usize,
    #[serde(flatten)]
    pub outcome: DecodeOutcome,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

pub fn print_records(records: &[DecodeRecord], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for record in records {
                println!(
                    "{}",
                    serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OFFSET", "RESULT", "FIELDS"]);
            for record in records {
                table.add_row(vec![
                    record.offset.to_string(),
                    record.outcome.name().to_string(),
                    record.outcome.summary(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for record in records {
                println!(
                    "@{} {} {}",
                    record.offset,
                    record.outcome.name(),
                    record.outcome.summary()
                );
            }
        }
        OutputFormat::Raw => {
            for record in records.iter().filter(|r| r.outcome.is_valid()) {
                print_raw(&record.bytes);
            }
        }
    }
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    kind: &'a str,
    size: usize,
    hex: String,
}

pub fn print_encoded(kind: &str, bytes: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EncodedOutput {
                kind,
                size: bytes.len(),
                hex: to_hex(bytes),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "SIZE", "HEX"])
                .add_row(vec![kind.to_string(), bytes.len().to_string(), to_hex(bytes)]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", to_hex(bytes)),
        OutputFormat::Raw => print_raw(bytes),
    }
}

#[derive(Serialize)]
struct JointStateOutput<'a> {
    stamp: f64,
    name: &'a [&'static str; 2],
    position: &'a [f64; 2],
}

/// One line per state; tables make no sense for a stream.
pub fn print_joint_state(state: &JointState, format: OutputFormat) {
    let line = match format {
        OutputFormat::Json | OutputFormat::Raw => {
            let out = JointStateOutput {
                stamp: unix_seconds(state.stamp),
                name: &state.name,
                position: &state.position,
            };
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table | OutputFormat::Pretty => format!(
            "{:.6} {}={:.6} {}={:.6}",
            unix_seconds(state.stamp),
            state.name[0],
            state.position[0],
            state.name[1],
            state.position[1]
        ),
    };
    print_line(&line);
}

pub fn print_latency(latency_ms: f64) {
    print_line(&format!("{{\"latency_ms\":{latency_ms}}}"));
}

fn print_line(line: &str) {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn to_hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

pub fn unix_seconds(stamp: SystemTime) -> f64 {
    stamp
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
