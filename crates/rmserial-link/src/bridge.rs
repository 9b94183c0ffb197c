use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime};

use rmserial_frame::{FrameError, FrameReader, FrameWriter, ReceivePacket, RobotColor, SendPacket};
use rmserial_transport::SerialTransport;
use tracing::{debug, error, info, warn};

use crate::color::ColorNegotiator;
use crate::config::BridgeConfig;
use crate::error::{LinkError, NegotiationError, Result};
use crate::sink::{JointState, LatencySink, StateSink, TargetCommand};
use crate::state::{lock, LinkState, LinkStats, LinkStatus};
use crate::supervisor::LinkSupervisor;

/// Name of the receive thread.
pub const RECEIVE_THREAD_NAME: &str = "rmserial-rx";

/// Minimum wait before asking again after the remote side was not ready.
/// A failed or rejected request is retried on the next disagreement.
pub const COLOR_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// The bridge's view of the rest of the system.
#[derive(Clone)]
pub struct Collaborators {
    pub state_sink: Arc<dyn StateSink>,
    pub latency_sink: Arc<dyn LatencySink>,
    pub negotiator: Arc<dyn ColorNegotiator>,
}

struct Shared<T> {
    supervisor: LinkSupervisor<T>,
    collaborators: Collaborators,
}

/// Bidirectional controller link.
///
/// Decodes controller frames on a dedicated receive thread and publishes them
/// to the [`StateSink`]; encodes [`TargetCommand`]s on the caller's thread.
/// I/O failures on either path are recovered by the [`LinkSupervisor`].
///
/// Dropping the bridge shuts it down; [`shutdown`](Self::shutdown) does the
/// same and returns the final counters.
pub struct Bridge<T: SerialTransport + 'static> {
    shared: Arc<Shared<T>>,
    receive_thread: Option<JoinHandle<()>>,
}

#[cfg(unix)]
impl Bridge<rmserial_transport::TtyPort> {
    /// Start a bridge on the serial device named in `config`.
    pub fn open_tty(config: &BridgeConfig, collaborators: Collaborators) -> Result<Self> {
        let port = rmserial_transport::TtyPort::new(&config.device_name, config.port);
        Self::start(port, config, collaborators)
    }
}

impl<T: SerialTransport + 'static> Bridge<T> {
    /// Validate `config`, open `transport` and start the receive thread.
    ///
    /// Invalid settings and a failed first open are returned; nothing is
    /// retried at startup.
    pub fn start(transport: T, config: &BridgeConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let supervisor = LinkSupervisor::new(transport, config.reconnect_backoff());
        match collaborators.negotiator.current() {
            Ok(Some(detect_color)) => {
                let robot_color = detect_color.opponent();
                supervisor.with_state(|state| state.robot_color = Some(robot_color));
                info!(%detect_color, %robot_color, "seeded robot color from detection color");
            }
            Ok(None) => debug!("detection color unknown at startup"),
            Err(err) => warn!(error = %err, "failed to read detection color at startup"),
        }
        supervisor.open()?;

        let shared = Arc::new(Shared {
            supervisor,
            collaborators,
        });
        let receive_thread = std::thread::Builder::new()
            .name(RECEIVE_THREAD_NAME.into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || shared.receive_loop()
            })
            .map_err(|err| {
                let _ = shared.supervisor.shutdown();
                LinkError::Spawn(err)
            })?;

        info!(device = %config.device_name, baud_rate = config.port.baud_rate, "bridge started");
        Ok(Self {
            shared,
            receive_thread: Some(receive_thread),
        })
    }

    /// Encode and write one command.
    ///
    /// The frame is dropped with [`LinkError::NotOpen`] while the link is
    /// reconnecting or closed. A write failure reconnects the link before
    /// the error is returned; the frame is not retried.
    pub fn send_command(&self, command: &TargetCommand) -> Result<SendPacket> {
        let supervisor = &self.shared.supervisor;
        let (status, generation, robot_color) =
            supervisor.with_state(|state| (state.status, state.generation, state.robot_color));
        if status != LinkStatus::Open {
            warn!(?status, "link not open; dropping command");
            return Err(LinkError::NotOpen(status));
        }

        let packet = command.to_packet(robot_color == Some(RobotColor::Red));
        let mut writer = FrameWriter::new(supervisor.transport());
        match writer.write_packet(&packet) {
            Ok(sent) => {
                supervisor.with_state(|state| state.stats.frames_sent += 1);
                let latency_ms = command.latency_ms(SystemTime::now());
                debug!(latency_ms, "command sent");
                self.shared.collaborators.latency_sink.record(latency_ms);
                Ok(sent)
            }
            Err(err) => {
                supervisor.with_state(|state| state.stats.send_failures += 1);
                error!(error = %err, "error while sending data");
                if let Err(reconnect_err) = supervisor.reconnect(generation) {
                    debug!(error = %reconnect_err, "send path gave up reconnecting");
                }
                Err(err.into())
            }
        }
    }

    pub fn status(&self) -> LinkStatus {
        self.shared.supervisor.status()
    }

    pub fn stats(&self) -> LinkStats {
        self.shared.supervisor.stats()
    }

    /// Last robot color confirmed by the remote side.
    pub fn robot_color(&self) -> Option<RobotColor> {
        self.shared.supervisor.robot_color()
    }

    pub fn supervisor(&self) -> &LinkSupervisor<T> {
        &self.shared.supervisor
    }

    /// Stop both paths, close the transport and join the receive thread.
    pub fn shutdown(mut self) -> LinkStats {
        self.stop();
        self.stats()
    }

    fn stop(&mut self) {
        let Some(handle) = self.receive_thread.take() else {
            return;
        };
        if let Err(err) = self.shared.supervisor.shutdown() {
            warn!(error = %err, "error while closing port");
        }
        if handle.join().is_err() {
            error!("receive thread panicked");
        }
        let stats = self.stats();
        info!(
            frames_received = stats.frames_received,
            header_errors = stats.header_errors,
            crc_errors = stats.crc_errors,
            frames_sent = stats.frames_sent,
            send_failures = stats.send_failures,
            reconnects = stats.reconnects,
            "bridge stopped"
        );
    }
}

impl<T: SerialTransport + 'static> Drop for Bridge<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T: SerialTransport> Shared<T> {
    fn receive_loop(&self) {
        let mut reader = FrameReader::new(self.supervisor.transport());
        debug!("receive loop started");

        while self.supervisor.is_running() {
            let generation = self.supervisor.generation();
            match reader.read_packet() {
                Ok(packet) => self.dispatch(packet),
                Err(FrameError::InvalidHeader(byte)) => {
                    self.supervisor
                        .with_state(|state| state.stats.header_errors += 1);
                    warn!(header = %format!("{byte:#04X}"), "invalid header");
                }
                Err(FrameError::CrcMismatch { computed, received }) => {
                    self.supervisor.with_state(|state| state.stats.crc_errors += 1);
                    error!(
                        computed = %format!("{computed:#06X}"),
                        received = %format!("{received:#06X}"),
                        "CRC error"
                    );
                }
                Err(FrameError::Transport(err)) => {
                    if !self.supervisor.is_running() {
                        break;
                    }
                    error!(error = %err, "error while receiving data");
                    if let Err(err) = self.supervisor.reconnect(generation) {
                        debug!(error = %err, "receive loop gave up reconnecting");
                        break;
                    }
                }
                Err(err) => error!(error = %err, "dropping frame"),
            }
        }

        debug!("receive loop stopped");
    }

    fn dispatch(&self, packet: ReceivePacket) {
        self.supervisor
            .with_state(|state| state.stats.frames_received += 1);
        self.collaborators
            .state_sink
            .publish(JointState::new(SystemTime::now(), packet.pitch, packet.yaw));

        match packet.color() {
            Some(color) => self.sync_color(color),
            None => warn!(robot_color = packet.robot_color, "unknown robot color"),
        }
    }

    /// Ask the remote side to detect the opponent of `reported` when it
    /// differs from the confirmed robot color. At most one request is in
    /// flight.
    fn sync_color(&self, reported: RobotColor) {
        let now = Instant::now();
        let claimed = self.supervisor.with_state(|state| {
            let throttled = state.color_retry_after.is_some_and(|after| now < after);
            if state.robot_color == Some(reported) || state.color_request_pending || throttled {
                return false;
            }
            state.color_request_pending = true;
            true
        });
        if !claimed {
            return;
        }

        let negotiator = &self.collaborators.negotiator;
        if !negotiator.is_ready() {
            self.supervisor.with_state(|state| {
                state.color_request_pending = false;
                state.color_retry_after = Some(now + COLOR_RETRY_INTERVAL);
            });
            warn!(robot_color = %reported, "detection color service not ready");
            return;
        }

        let detect_color = reported.opponent();
        info!(robot_color = %reported, %detect_color, "requesting detection color change");
        let request = ColorRequest {
            state: Some(self.supervisor.state_handle()),
            reported,
            detect_color,
        };
        negotiator.request_set(detect_color, Box::new(move |result| request.finish(result)));
    }
}

/// An outstanding detection-color request.
///
/// Clears the in-flight flag exactly once: when the negotiator answers, or
/// with [`NegotiationError::ChannelClosed`] if it drops the completion.
struct ColorRequest {
    state: Option<Arc<Mutex<LinkState>>>,
    reported: RobotColor,
    detect_color: RobotColor,
}

impl ColorRequest {
    fn finish(mut self, result: std::result::Result<(), NegotiationError>) {
        self.complete(result);
    }

    fn complete(&mut self, result: std::result::Result<(), NegotiationError>) {
        let Some(state) = self.state.take() else {
            return;
        };
        let (reported, detect_color) = (self.reported, self.detect_color);
        let mut state = lock(&state);
        state.color_request_pending = false;
        match result {
            Ok(()) => {
                state.robot_color = Some(reported);
                info!(robot_color = %reported, %detect_color, "detection color updated");
            }
            Err(err) => error!(error = %err, %detect_color, "failed to set detection color"),
        }
    }
}

impl Drop for ColorRequest {
    fn drop(&mut self) {
        self.complete(Err(NegotiationError::ChannelClosed));
    }
}
