use std::path::{Path, PathBuf};

use rmserial_frame::RobotColor;
use rmserial_link::{ColorNegotiator, Completion, NegotiationError};
use tracing::debug;

/// Detection-color parameter kept in a small text file (`red` or `blue`).
///
/// Lets an external vision process pick up the color the bridge chose.
/// Writes go through a temporary file and a rename so readers never see a
/// partial value.
#[derive(Debug)]
pub struct FileParameter {
    path: PathBuf,
}

impl FileParameter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn store(&self, color: RobotColor) -> std::io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, format!("{color}\n"))?;
        std::fs::rename(&tmp, &self.path)
    }
}

pub fn parse_color(text: &str) -> Option<RobotColor> {
    match text.trim().to_ascii_lowercase().as_str() {
        "red" | "0" => Some(RobotColor::Red),
        "blue" | "1" => Some(RobotColor::Blue),
        _ => None,
    }
}

impl ColorNegotiator for FileParameter {
    fn is_ready(&self) -> bool {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.is_dir(),
            _ => true,
        }
    }

    fn request_set(&self, detect_color: RobotColor, done: Completion) {
        let result = self.store(detect_color).map_err(|err| {
            NegotiationError::Rejected(format!("failed writing {}: {err}", self.path.display()))
        });
        if result.is_ok() {
            debug!(path = %self.path.display(), %detect_color, "detection color written");
        }
        done(result);
    }

    fn current(&self) -> Result<Option<RobotColor>, NegotiationError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => parse_color(&text).map(Some).ok_or_else(|| {
                NegotiationError::Rejected(format!(
                    "{} holds {:?}, expected red or blue",
                    self.path.display(),
                    text.trim()
                ))
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(NegotiationError::Rejected(format!(
                "failed reading {}: {err}",
                self.path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "rmserial-param-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn missing_file_means_unknown() {
        let dir = temp_dir("missing");
        let param = FileParameter::new(dir.join("detect_color"));
        assert!(param.is_ready());
        assert_eq!(param.current(), Ok(None));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn request_writes_value_and_completes() {
        let dir = temp_dir("write");
        let param = FileParameter::new(dir.join("detect_color"));
        let outcome = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&outcome);
        param.request_set(
            RobotColor::Blue,
            Box::new(move |result| *slot.lock().unwrap() = Some(result)),
        );

        assert_eq!(*outcome.lock().unwrap(), Some(Ok(())));
        assert_eq!(
            std::fs::read_to_string(param.path()).unwrap(),
            "blue\n"
        );
        assert_eq!(param.current(), Ok(Some(RobotColor::Blue)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn garbage_content_is_an_error() {
        let dir = temp_dir("garbage");
        let path = dir.join("detect_color");
        std::fs::write(&path, "green").unwrap();
        let param = FileParameter::new(&path);
        assert!(matches!(param.current(), Err(NegotiationError::Rejected(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_is_not_ready() {
        let param = FileParameter::new("/nonexistent-rmserial-dir/detect_color");
        assert!(!param.is_ready());
    }

    #[test]
    fn parses_names_and_wire_values() {
        assert_eq!(parse_color(" Red\n"), Some(RobotColor::Red));
        assert_eq!(parse_color("1"), Some(RobotColor::Blue));
        assert_eq!(parse_color("purple"), None);
    }
}
