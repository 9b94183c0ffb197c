#![cfg_attr(not(unix), allow(dead_code))]

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rmserial_link::{BridgeConfig, ColorNegotiator, SharedParameter, TargetCommand, Vec3};
use rmserial_transport::SerialPortConfig;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cmd::RunArgs;
use crate::exit::{link_error, CliError, CliResult, CONFIG, INTERNAL, USAGE};
use crate::param::FileParameter;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One command per stdin line, e.g.
/// `{"target_found":true,"position":{"x":1,"y":2,"z":3},"stamp":1700000000.25}`.
/// Missing fields default to zero; a missing stamp means "now".
#[derive(Debug, Deserialize)]
struct CommandLine {
    #[serde(default)]
    target_found: bool,
    #[serde(default)]
    position: Vec3,
    #[serde(default)]
    velocity: Vec3,
    /// Seconds since the Unix epoch.
    stamp: Option<f64>,
}

impl CommandLine {
    fn into_command(self) -> TargetCommand {
        let stamp = self
            .stamp
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .map_or_else(SystemTime::now, |since| UNIX_EPOCH + since);
        TargetCommand {
            target_found: self.target_found,
            position: self.position,
            velocity: self.velocity,
            stamp,
        }
    }
}

#[cfg(unix)]
pub fn run(args: RunArgs, format: crate::output::OutputFormat) -> CliResult<i32> {
    use rmserial_link::{Bridge, Collaborators, JointState};

    use crate::exit::SUCCESS;
    use crate::output::{print_joint_state, print_latency};

    let config = resolve_config(&args)?;
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let emit_latency = args.emit_latency;
    let collaborators = Collaborators {
        state_sink: Arc::new(move |state: JointState| print_joint_state(&state, format)),
        latency_sink: Arc::new(move |latency_ms: f64| {
            if emit_latency {
                print_latency(latency_ms);
            }
        }),
        negotiator: negotiator(&args),
    };

    let bridge = Bridge::open_tty(&config, collaborators)
        .map_err(|err| link_error("failed to start bridge", err))?;
    let commands = spawn_stdin_reader()?;
    info!(device = %config.device_name, "bridge running; Ctrl-C to stop");

    let mut stdin_open = true;
    while running.load(Ordering::SeqCst) {
        if !stdin_open {
            std::thread::sleep(POLL_INTERVAL);
            continue;
        }
        match commands.recv_timeout(POLL_INTERVAL) {
            Ok(command) => {
                if let Err(err) = bridge.send_command(&command) {
                    debug!(error = %err, "command dropped");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("stdin closed; no more commands");
                stdin_open = false;
            }
        }
    }

    bridge.shutdown();
    Ok(SUCCESS)
}

#[cfg(not(unix))]
pub fn run(_args: RunArgs, _format: crate::output::OutputFormat) -> CliResult<i32> {
    Err(CliError::new(
        CONFIG,
        "serial devices are only supported on unix hosts",
    ))
}

/// Config file first, then flag overrides, then validation.
fn resolve_config(args: &RunArgs) -> CliResult<BridgeConfig> {
    let mut config = match (&args.config, &args.device) {
        (Some(path), _) => {
            BridgeConfig::from_file(path).map_err(|err| link_error("failed to load config", err))?
        }
        (None, Some(device)) => BridgeConfig::new(device.clone(), SerialPortConfig::default()),
        (None, None) => {
            return Err(CliError::new(
                USAGE,
                "either --device or --config is required",
            ))
        }
    };

    if let Some(device) = &args.device {
        config.device_name = device.clone();
    }
    if let Some(baud_rate) = args.baud_rate {
        config.port.baud_rate = baud_rate;
    }
    if let Some(flow_control) = args.flow_control {
        config.port.flow_control = flow_control;
    }
    if let Some(parity) = args.parity {
        config.port.parity = parity;
    }
    if let Some(stop_bits) = args.stop_bits {
        config.port.stop_bits = stop_bits;
    }
    if let Some(backoff) = args.reconnect_backoff_ms {
        config.reconnect_backoff_ms = backoff;
    }

    config
        .validate()
        .map_err(|err| CliError::new(CONFIG, format!("invalid configuration: {err}")))?;
    Ok(config)
}

fn negotiator(args: &RunArgs) -> Arc<dyn ColorNegotiator> {
    match &args.color_param {
        Some(path) => {
            let parameter = FileParameter::new(path);
            info!(path = %parameter.path().display(), "detection color kept in file");
            Arc::new(parameter)
        }
        None => Arc::new(SharedParameter::new()),
    }
}

fn parse_command(line: &str) -> Result<TargetCommand, serde_json::Error> {
    serde_json::from_str::<CommandLine>(line).map(CommandLine::into_command)
}

fn spawn_stdin_reader() -> CliResult<Receiver<TargetCommand>> {
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("rmserial-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        warn!(error = %err, "failed reading stdin");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(command) => {
                        if tx.send(command).is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(error = %err, "ignoring malformed command line"),
                }
            }
        })
        .map_err(|err| CliError::new(INTERNAL, format!("failed to spawn stdin reader: {err}")))?;
    Ok(rx)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
