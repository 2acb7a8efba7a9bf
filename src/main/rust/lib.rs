pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-exports for convenience
pub use application::services::{
    BridgeController, BridgeDependencies, BridgeOptions, BridgeStopHandle, ProcessSession,
    ProcessSupervisor, StreamAdapter, SupervisorOptions,
};
pub use config::Config;
pub use domain::entities::{FrameAssembler, SessionLifecycle, StateTransition, TypeRegistry};
pub use domain::errors::{DomainError, Result};
pub use domain::ports::{
    ChildProcess, Clock, MessageBus, MessageCodec, MetricsReporter, ProcessExit, ProcessLauncher,
    Publisher,
};
pub use domain::value_objects::{
    BridgeConfig, ConnectRetryPolicy, Direction, FramingPolicy, MessageTypeName, Mode, Platform,
    SessionState, StreamFrame,
};
pub use infrastructure::bus::{InMemoryBus, StdioBus};
pub use infrastructure::clock::SystemClock;
pub use infrastructure::ffmpeg::{FfmpegCommandBuilder, OsProcessLauncher};
pub use infrastructure::metrics::{serve_metrics, PrometheusReporter};
