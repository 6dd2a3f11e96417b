//! Error types for the processing pipeline and the live reload channel.

use std::fmt;
use std::path::PathBuf;

/// Pipeline phase a stage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parse,
    Pre,
    Local,
    Post,
    Finalize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Parse => "parse",
            Phase::Pre => "pre",
            Phase::Local => "local",
            Phase::Post => "post",
            Phase::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// Error raised by a single stage function.
///
/// Stages only report a message; the pipeline attaches the phase and stage
/// name when it propagates the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    message: String,
}

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StageError {}

impl From<String> for StageError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for StageError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for StageError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Error type for pipeline construction, execution and live broadcasting
#[derive(Debug)]
pub enum PipelineError {
    /// A stage failed; the run was aborted at this point
    Stage {
        phase: Phase,
        stage: String,
        message: String,
    },
    /// A stage reference could not be resolved through the stage table
    StageNotFound { name: String, basedir: PathBuf },
    /// Invalid manifest or option value
    Config(String),
    /// Push channel publish or subscribe failure
    Channel(String),
    Io(std::io::Error),
}

impl PipelineError {
    pub fn stage(phase: Phase, stage: &str, err: StageError) -> Self {
        PipelineError::Stage {
            phase,
            stage: stage.to_string(),
            message: err.message,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Stage {
                phase,
                stage,
                message,
            } => write!(f, "Stage '{}' failed during {} phase: {}", stage, phase, message),
            PipelineError::StageNotFound { name, basedir } => write!(
                f,
                "Stage not found: '{}' (resolved from {})",
                name,
                basedir.display()
            ),
            PipelineError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PipelineError::Channel(msg) => write!(f, "Push channel error: {}", msg),
            PipelineError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_display_includes_phase() {
        let err = PipelineError::stage(Phase::Post, "banner", StageError::new("boom"));
        assert_eq!(
            err.to_string(),
            "Stage 'banner' failed during post phase: boom"
        );
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error;

        let err: PipelineError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("IO error"));
    }
}
