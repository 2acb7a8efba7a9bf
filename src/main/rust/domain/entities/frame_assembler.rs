use crate::domain::value_objects::{FramingPolicy, StreamFrame};

/// Cuts the decoder's byte stream into outgoing frames
#[derive(Debug)]
pub struct FrameAssembler {
    policy: FramingPolicy,
    pending: Vec<u8>,
}

impl FrameAssembler {
    pub fn new(policy: FramingPolicy) -> Self {
        Self {
            policy,
            pending: Vec::new(),
        }
    }

    /// Feed one read's worth of bytes, returning every frame it completes
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamFrame> {
        if bytes.is_empty() {
            return Vec::new();
        }

        match self.policy {
            FramingPolicy::PassThrough => vec![StreamFrame::from(bytes)],
            FramingPolicy::FixedSize(size) => {
                let size = size.get();
                self.pending.extend_from_slice(bytes);

                let complete = self.pending.len() / size * size;
                if complete == 0 {
                    return Vec::new();
                }

                let rest = self.pending.split_off(complete);
                let ready = std::mem::replace(&mut self.pending, rest);
                ready
                    .chunks_exact(size)
                    .map(StreamFrame::from)
                    .collect()
            }
        }
    }

    /// Bytes held back waiting for a full frame
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Discard a trailing partial frame, returning its length
    pub fn finish(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}
