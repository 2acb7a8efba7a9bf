use std::sync::Arc;

use crate::domain::errors::Result;
use crate::domain::ports::MessageCodec;
use crate::domain::value_objects::MessageTypeName;

/// Resolved message type handed to the bus
#[derive(Clone)]
pub struct TypeDescriptor {
    pub name: MessageTypeName,
    pub codec: Arc<dyn MessageCodec>,
}

impl std::fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name.to_string())
            .finish()
    }
}

/// Invoked with each wire message received on a subscribed topic
pub type MessageCallback = Box<dyn Fn(&[u8]) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Publication target; unregistered when dropped
pub trait Publisher: Send {
    fn send(&self, message: &[u8]) -> Result<()>;
}

/// Port for the topic-based messaging bus
pub trait MessageBus: Send + Sync {
    fn subscribe(
        &self,
        topic: &str,
        message_type: &TypeDescriptor,
        callback: MessageCallback,
    ) -> Result<SubscriptionId>;

    fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;

    fn advertise(&self, topic: &str, message_type: &TypeDescriptor) -> Result<Box<dyn Publisher>>;
}
