use super::{Direction, MessageTypeName, Mode, Platform};
use crate::domain::errors::{DomainError, Result};

/// Configuration for one topic/stream bridge
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    platform: Platform,
    mode: Mode,
    topic: String,
    message_type: MessageTypeName,
    stream_url: String,
}

impl BridgeConfig {
    pub fn new(
        platform: &str,
        mode: &str,
        topic: String,
        message_type: &str,
        stream_url: String,
    ) -> Result<Self> {
        let platform = Self::require("platform", platform)?.parse()?;
        let mode = Self::require("mode", mode)?.parse()?;
        Self::require("topic", &topic)?;
        let message_type = MessageTypeName::parse(Self::require("message_type", message_type)?)?;
        Self::validate_stream_url(Self::require("stream_url", &stream_url)?)?;

        Ok(Self {
            platform,
            mode,
            topic,
            message_type,
            stream_url,
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn message_type(&self) -> &MessageTypeName {
        &self.message_type
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn direction(&self) -> Direction {
        Direction::resolve(self.platform, self.mode)
    }

    fn require<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
        if value.trim().is_empty() {
            return Err(DomainError::MissingField(field));
        }
        Ok(value)
    }

    fn validate_stream_url(url: &str) -> Result<()> {
        if !url.starts_with("rtmp://") && !url.starts_with("rtmps://") {
            return Err(DomainError::InvalidStreamUrl(url.to_string()));
        }
        Ok(())
    }
}
