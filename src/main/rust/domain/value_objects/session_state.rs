use std::fmt;

/// External process session states (pure domain)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Not started yet
    #[default]
    Idle,
    /// Process is being spawned
    Starting,
    /// Process is alive after spawn
    Connected,
    /// Spawn failed or process died, waiting to retry
    Retrying { attempt: u32 },
    /// Data is flowing through the process pipes
    Streaming,
    /// Process exited or was terminated
    Stopped,
    /// Connect budget exhausted
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Starting => write!(f, "STARTING"),
            Self::Connected => write!(f, "CONNECTED"),
            Self::Retrying { attempt } => write!(f, "RETRYING (attempt {})", attempt),
            Self::Streaming => write!(f, "STREAMING"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl SessionState {
    /// Convert state to numeric value for metrics
    pub fn as_metric(&self) -> f64 {
        match self {
            Self::Idle => 0.0,
            Self::Starting => 1.0,
            Self::Connected => 2.0,
            Self::Retrying { .. } => 3.0,
            Self::Streaming => 4.0,
            Self::Stopped => 5.0,
            Self::Failed => 6.0,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// No further transitions happen out of these states
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}
