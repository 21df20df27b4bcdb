use std::io;
use thiserror::Error;

pub type Result<T> = ::std::result::Result<T, MonitorError>;

/// How loudly a failure should be reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Sample source `{source_name}` is not available in this environment")]
    SourceUnavailable { source_name: String },
    #[error("Failed to attach sample source `{source_name}`: {reason}")]
    SourceAttach { source_name: String, reason: String },
    #[error("Runtime environment does not support `{capability}`")]
    EnvironmentUnavailable { capability: String },
    #[error("Analysis `{analysis}` failed: {reason}")]
    Analysis { analysis: String, reason: String },
    #[error("Subscriber #{subscriber} failed: {reason}")]
    Subscriber { subscriber: u64, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("Input output error: {0}")]
    Io(#[from] io::Error),
}

impl MonitorError {
    pub fn source_unavailable(source_name: impl Into<String>) -> Self {
        MonitorError::SourceUnavailable {
            source_name: source_name.into(),
        }
    }

    pub fn source_attach(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        MonitorError::SourceAttach {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn environment_unavailable(capability: impl Into<String>) -> Self {
        MonitorError::EnvironmentUnavailable {
            capability: capability.into(),
        }
    }

    pub fn analysis(analysis: impl Into<String>, reason: impl Into<String>) -> Self {
        MonitorError::Analysis {
            analysis: analysis.into(),
            reason: reason.into(),
        }
    }

    pub fn subscriber(subscriber: u64, reason: impl Into<String>) -> Self {
        MonitorError::Subscriber {
            subscriber,
            reason: reason.into(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MonitorError::SourceUnavailable { .. } | MonitorError::EnvironmentUnavailable { .. } => {
                ErrorSeverity::Info
            }
            MonitorError::Subscriber { .. } | MonitorError::Analysis { .. } => {
                ErrorSeverity::Warning
            }
            _ => ErrorSeverity::Error,
        }
    }

    /// Whether monitoring can carry on after this error. Only setup and
    /// configuration failures stop the caller.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            MonitorError::SourceAttach { .. }
                | MonitorError::InvalidConfig(_)
                | MonitorError::ConfigParse(_)
        )
    }
}
