mod clock;
mod message_bus;
mod message_codec;
mod metrics_reporter;
mod process_launcher;

pub use clock::Clock;
pub use message_bus::{MessageBus, MessageCallback, Publisher, SubscriptionId, TypeDescriptor};
pub use message_codec::{MessageCodec, RawCodec};
pub use metrics_reporter::MetricsReporter;
pub use process_launcher::{ChildProcess, ProcessExit, ProcessLauncher};
