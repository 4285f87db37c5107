use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DepthcapError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot {operation} while {state}")]
    State {
        operation: &'static str,
        state: String,
    },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Manifest parse error: {message}")]
    Parse { message: String },

    #[error("Project already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("Archive error: {0}")]
    Archive(zip::result::ZipError),

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl DepthcapError {
    pub fn state<S: Display>(operation: &'static str, state: S) -> Self {
        Self::State {
            operation,
            state: state.to_string(),
        }
    }

    pub fn encode<S: Into<String>>(message: S) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for DepthcapError {
    fn from(e: serde_json::Error) -> Self {
        Self::parse(e.to_string())
    }
}

impl From<zip::result::ZipError> for DepthcapError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::Archive(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, DepthcapError>;

#[cfg(test)]
mod tests {
    use super::*;
    use zip::result::ZipError;

    #[test]
    fn test_zip_io_errors_surface_as_io() {
        let err = DepthcapError::from(ZipError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        )));
        assert!(matches!(err, DepthcapError::Io(_)));

        let err = DepthcapError::from(ZipError::FileNotFound);
        assert!(matches!(err, DepthcapError::Archive(_)));
    }

    #[test]
    fn test_state_error_message() {
        let err = DepthcapError::state("finalize", "session is idle");
        assert_eq!(err.to_string(), "Cannot finalize while session is idle");
    }
}
