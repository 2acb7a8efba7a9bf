use std::fmt;
use std::str::FromStr;

use crate::domain::errors::DomainError;

/// Deployment side this bridge instance runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Edge,
    User,
}

/// Configured bus role of this bridge instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Pub,
    Sub,
}

impl FromStr for Platform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "edge" => Ok(Self::Edge),
            "user" => Ok(Self::User),
            other => Err(DomainError::InvalidPlatform(other.to_string())),
        }
    }
}

impl FromStr for Mode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pub" => Ok(Self::Pub),
            "sub" => Ok(Self::Sub),
            other => Err(DomainError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edge => write!(f, "edge"),
            Self::User => write!(f, "user"),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pub => write!(f, "pub"),
            Self::Sub => write!(f, "sub"),
        }
    }
}
