mod bridge_controller;
mod process_supervisor;
mod stream_adapter;

pub use bridge_controller::{BridgeController, BridgeDependencies, BridgeOptions, BridgeStopHandle};
pub use process_supervisor::{ProcessSession, ProcessSupervisor, SessionControl, SupervisorOptions};
pub use stream_adapter::{EgressSummary, StreamAdapter, DEFAULT_READ_BUFFER_SIZE};
