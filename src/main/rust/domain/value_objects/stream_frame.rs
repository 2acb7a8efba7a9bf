use std::num::NonZeroUsize;

use crate::domain::errors::{DomainError, Result};

/// Opaque payload crossing the bus/process boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame(Vec<u8>);

impl StreamFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for StreamFrame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for StreamFrame {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// How decoder output is cut into outgoing frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingPolicy {
    /// Every non-empty pipe read becomes one frame
    #[default]
    PassThrough,
    /// Output is reassembled into frames of exactly this many bytes
    FixedSize(NonZeroUsize),
}

impl FramingPolicy {
    /// `0` selects pass-through
    pub fn from_frame_size(frame_size: usize) -> Self {
        NonZeroUsize::new(frame_size)
            .map(Self::FixedSize)
            .unwrap_or(Self::PassThrough)
    }

    pub fn fixed(frame_size: usize) -> Result<Self> {
        NonZeroUsize::new(frame_size)
            .map(Self::FixedSize)
            .ok_or(DomainError::InvalidFrameSize)
    }
}
