use std::fmt;

use super::{Mode, Platform};
use crate::domain::errors::Result;

/// Data-flow direction of a bridge instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Bus messages are encoded and pushed out as a live stream
    Ingest,
    /// A live stream is decoded and republished as bus messages
    Egress,
}

impl Direction {
    /// Map a deployment role to its data flow.
    ///
    /// The same mode label means opposite things on the two platforms:
    /// an edge publisher pulls the stream onto its local bus, while a user
    /// publisher pushes its local bus out as a stream.
    pub fn resolve(platform: Platform, mode: Mode) -> Self {
        match (platform, mode) {
            (Platform::Edge, Mode::Pub) => Self::Egress,
            (Platform::Edge, Mode::Sub) => Self::Ingest,
            (Platform::User, Mode::Pub) => Self::Ingest,
            (Platform::User, Mode::Sub) => Self::Egress,
        }
    }

    /// Resolve from raw configuration labels
    pub fn resolve_labels(platform: &str, mode: &str) -> Result<Self> {
        Ok(Self::resolve(platform.parse()?, mode.parse()?))
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingest => write!(f, "ingest"),
            Self::Egress => write!(f, "egress"),
        }
    }
}
