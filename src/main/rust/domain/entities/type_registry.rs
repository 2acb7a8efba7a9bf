use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{MessageCodec, RawCodec, TypeDescriptor};
use crate::domain::value_objects::MessageTypeName;

/// Message types carried as opaque serialized bytes by default
const DEFAULT_TYPES: &[&str] = &[
    "sensor_msgs/Image",
    "sensor_msgs/CompressedImage",
    "sensor_msgs/PointCloud2",
    "sensor_msgs/Imu",
    "sensor_msgs/LaserScan",
    "std_msgs/String",
    "std_msgs/ByteMultiArray",
    "geometry_msgs/Twist",
    "nav_msgs/Odometry",
    "audio_common_msgs/AudioData",
];

/// Maps message type names to their serialization capability
#[derive(Default)]
pub struct TypeRegistry {
    codecs: HashMap<MessageTypeName, Arc<dyn MessageCodec>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with common types using the pass-through codec
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for name in DEFAULT_TYPES {
            if let Ok(name) = MessageTypeName::parse(name) {
                registry.register(name, Arc::new(RawCodec));
            }
        }
        registry
    }

    pub fn register(&mut self, name: MessageTypeName, codec: Arc<dyn MessageCodec>) {
        self.codecs.insert(name, codec);
    }

    pub fn register_raw(&mut self, name: &str) -> Result<()> {
        let name = MessageTypeName::parse(name)?;
        self.register(name, Arc::new(RawCodec));
        Ok(())
    }

    pub fn resolve(&self, name: &MessageTypeName) -> Result<TypeDescriptor> {
        self.codecs
            .get(name)
            .map(|codec| TypeDescriptor {
                name: name.clone(),
                codec: codec.clone(),
            })
            .ok_or_else(|| DomainError::MessageTypeNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}
