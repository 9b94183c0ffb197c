use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::{FlowControl, Parity, SerialPortConfig, StopBits};
use crate::error::{Result, TransportError};
use crate::traits::SerialTransport;

/// Read poll interval in deciseconds (termios `VTIME`).
const POLL_DECISECONDS: libc::cc_t = 1;

/// A zero-byte read returning faster than this is a hangup, not a poll timeout.
const HANGUP_THRESHOLD: Duration = Duration::from_millis(20);

/// POSIX serial device (Linux/macOS).
///
/// The device is put in raw mode with the configured line settings on every
/// open. Reads poll with a short `VTIME` so an in-flight [`receive`] notices
/// a concurrent [`close`] instead of blocking on a stale descriptor.
///
/// [`receive`]: SerialTransport::receive
/// [`close`]: SerialTransport::close
pub struct TtyPort {
    device: PathBuf,
    config: SerialPortConfig,
    file: Mutex<Option<Arc<File>>>,
}

impl TtyPort {
    /// Create a closed port for `device` with fixed line settings.
    pub fn new(device: impl AsRef<Path>, config: SerialPortConfig) -> Self {
        Self {
            device: device.as_ref().to_path_buf(),
            config,
            file: Mutex::new(None),
        }
    }

    /// The device path this port opens.
    pub fn device(&self) -> &Path {
        &self.device
    }

    /// The line settings applied on open.
    pub fn config(&self) -> &SerialPortConfig {
        &self.config
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<File>>> {
        self.file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current(&self) -> Result<Arc<File>> {
        self.slot().clone().ok_or(TransportError::NotOpen)
    }

    fn is_current(&self, file: &Arc<File>) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|open| Arc::ptr_eq(open, file))
    }

    fn open_device(&self) -> Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&self.device)
            .map_err(|source| TransportError::Open {
                device: self.device.clone(),
                source,
            })?;

        configure(&file, &self.config).map_err(|err| match err {
            TransportError::Io(source) => TransportError::Configure {
                device: self.device.clone(),
                source,
            },
            other => other,
        })?;

        Ok(file)
    }
}

impl SerialTransport for TtyPort {
    fn open(&self) -> Result<()> {
        let mut slot = self.slot();
        if slot.is_some() {
            return Ok(());
        }
        let file = self.open_device()?;
        *slot = Some(Arc::new(file));
        info!(device = ?self.device, baud_rate = self.config.baud_rate, "opened serial device");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if self.slot().take().is_some() {
            debug!(device = ?self.device, "closed serial device");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.slot().is_some()
    }

    fn receive(&self, buf: &mut [u8]) -> Result<()> {
        let file = self.current()?;
        let mut filled = 0usize;
        while filled < buf.len() {
            let started = Instant::now();
            match (&*file).read(&mut buf[filled..]) {
                Ok(0) => {
                    if !self.is_current(&file) {
                        return Err(TransportError::NotOpen);
                    }
                    if started.elapsed() < HANGUP_THRESHOLD {
                        return Err(TransportError::Io(std::io::Error::new(
                            ErrorKind::UnexpectedEof,
                            "serial device hung up",
                        )));
                    }
                }
                Ok(n) => {
                    // a frame straddling a reopen is dropped, not completed
                    // with bytes from the new descriptor
                    if !self.is_current(&file) {
                        return Err(TransportError::NotOpen);
                    }
                    filled += n;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }

    fn send(&self, buf: &[u8]) -> Result<()> {
        let file = self.current()?;
        let mut writer = &*file;
        writer.write_all(buf)?;
        writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "tty"
    }
}

impl std::fmt::Debug for TtyPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtyPort")
            .field("device", &self.device)
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}

fn configure(file: &File, config: &SerialPortConfig) -> Result<()> {
    let fd = file.as_raw_fd();
    let speed = baud_constant(config.baud_rate).ok_or_else(|| {
        TransportError::Unsupported(format!("baud rate {}", config.baud_rate))
    })?;

    // SAFETY: termios is a plain C struct; an all-zero value is valid storage
    // and is fully overwritten by tcgetattr below.
    let mut tty: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `fd` is an open descriptor owned by `file` and `tty` is a valid,
    // writable termios for the duration of each call.
    unsafe {
        if libc::tcgetattr(fd, &mut tty) != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        libc::cfmakeraw(&mut tty);
    }

    tty.c_cflag |= libc::CREAD | libc::CLOCAL;

    match config.parity {
        Parity::None => tty.c_cflag &= !libc::PARENB,
        Parity::Odd => tty.c_cflag |= libc::PARENB | libc::PARODD,
        Parity::Even => {
            tty.c_cflag |= libc::PARENB;
            tty.c_cflag &= !libc::PARODD;
        }
    }

    match config.stop_bits {
        StopBits::One => tty.c_cflag &= !libc::CSTOPB,
        StopBits::Two => tty.c_cflag |= libc::CSTOPB,
        StopBits::OnePointFive => {
            return Err(TransportError::Unsupported(
                "1.5 stop bits on a POSIX tty".to_string(),
            ))
        }
    }

    match config.flow_control {
        FlowControl::None => {
            tty.c_cflag &= !libc::CRTSCTS;
            tty.c_iflag &= !(libc::IXON | libc::IXOFF | libc::IXANY);
        }
        FlowControl::Hardware => {
            tty.c_cflag |= libc::CRTSCTS;
            tty.c_iflag &= !(libc::IXON | libc::IXOFF | libc::IXANY);
        }
        FlowControl::Software => {
            tty.c_cflag &= !libc::CRTSCTS;
            tty.c_iflag |= libc::IXON | libc::IXOFF;
        }
    }

    tty.c_cc[libc::VMIN] = 0;
    tty.c_cc[libc::VTIME] = POLL_DECISECONDS;

    // SAFETY: same invariants as above; `tty` was initialized by tcgetattr.
    unsafe {
        if libc::cfsetispeed(&mut tty, speed) != 0 || libc::cfsetospeed(&mut tty, speed) != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        if libc::tcsetattr(fd, libc::TCSANOW, &tty) != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        libc::tcflush(fd, libc::TCIOFLUSH);

        // Opened non-blocking so a missing carrier cannot hang open(); reads
        // rely on VMIN/VTIME from here on.
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
    }

    Ok(())
}

fn baud_constant(baud_rate: u32) -> Option<libc::speed_t> {
    let speed = match baud_rate {
        9_600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        #[cfg(target_os = "linux")]
        460_800 => libc::B460800,
        #[cfg(target_os = "linux")]
        921_600 => libc::B921600,
        #[cfg(target_os = "linux")]
        1_000_000 => libc::B1000000,
        #[cfg(target_os = "linux")]
        2_000_000 => libc::B2000000,
        _ => return None,
    };
    Some(speed)
}
