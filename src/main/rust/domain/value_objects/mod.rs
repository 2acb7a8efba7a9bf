mod bridge_config;
mod direction;
mod message_type;
mod platform;
mod retry_policy;
mod session_state;
mod stream_frame;

pub use bridge_config::BridgeConfig;
pub use direction::Direction;
pub use message_type::MessageTypeName;
pub use platform::{Mode, Platform};
pub use retry_policy::ConnectRetryPolicy;
pub use session_state::SessionState;
pub use stream_frame::{FramingPolicy, StreamFrame};
