use std::fmt;
use std::io;

use rmserial_frame::FrameError;
use rmserial_link::LinkError;
use rmserial_transport::TransportError;

// Exit codes follow sysexits where one fits.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const CONFIG: i32 = 78;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { ref source, .. } | TransportError::Configure { ref source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        TransportError::Io(source) => io_error(context, source),
        TransportError::Unsupported(_) => CliError::new(CONFIG, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Transport(err) => transport_error(context, err),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Transport(err) => transport_error(context, err),
        LinkError::Frame(err) => frame_error(context, err),
        LinkError::Config(_) | LinkError::ConfigParse(_) => {
            CliError::new(CONFIG, format!("{context}: {err}"))
        }
        LinkError::ConfigFile { source, path } => io_error(
            &format!("{context}: failed to read {}", path.display()),
            source,
        ),
        LinkError::NotOpen(_) | LinkError::Stopped => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rmserial_transport::ConfigError;

    use super::*;

    #[test]
    fn permission_denied_open_maps_to_permission_code() {
        let err = TransportError::Open {
            device: PathBuf::from("/dev/ttyACM0"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(transport_error("open", err).code, PERMISSION_DENIED);
    }

    #[test]
    fn missing_device_maps_to_transport_code() {
        let err = TransportError::Open {
            device: PathBuf::from("/dev/ttyACM9"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        let cli = transport_error("open", err);
        assert_eq!(cli.code, TRANSPORT_ERROR);
        assert!(cli.message.contains("/dev/ttyACM9"));
    }

    #[test]
    fn config_errors_map_to_config_code() {
        let err = LinkError::Config(ConfigError::Empty("device_name"));
        assert_eq!(link_error("start", err).code, CONFIG);
    }

    #[test]
    fn crc_mismatch_is_invalid_data() {
        let err = FrameError::CrcMismatch {
            computed: 1,
            received: 2,
        };
        assert_eq!(frame_error("decode", err).code, DATA_INVALID);
    }
}
