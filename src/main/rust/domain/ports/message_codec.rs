use crate::domain::errors::Result;

/// Serialization capability for one message type
pub trait MessageCodec: Send + Sync {
    /// Wire message from the bus to the bytes fed to the encoder
    fn serialize(&self, message: &[u8]) -> Result<Vec<u8>>;

    /// Decoder output to a wire message for the bus
    fn deserialize(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

/// Passes serialized messages through untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl MessageCodec for RawCodec {
    fn serialize(&self, message: &[u8]) -> Result<Vec<u8>> {
        Ok(message.to_vec())
    }

    fn deserialize(&self, payload: &[u8]) -> Result<Vec<u8>> {
        Ok(payload.to_vec())
    }
}
