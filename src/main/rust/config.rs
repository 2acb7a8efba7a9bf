use std::time::Duration;

use clap::Parser;

use crate::application::services::{BridgeOptions, SupervisorOptions};
use crate::domain::entities::TypeRegistry;
use crate::domain::value_objects::{BridgeConfig, ConnectRetryPolicy, FramingPolicy, Mode, Platform};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ros2rtmp-bridge",
    version = "0.1.0",
    about = "Bridges a bus topic to an RTMP stream in either direction"
)]
pub struct Config {
    /// Deployment side: edge or user
    #[arg(long, env = "PLATFORM")]
    pub platform: String,

    /// Bus role: pub or sub
    #[arg(long, env = "MODE")]
    pub mode: String,

    /// Bus topic to bridge
    #[arg(long, env = "ROS2RTMP_ROS_TOPIC")]
    pub topic: String,

    /// Message type of the topic (package/TypeName)
    #[arg(long = "message-type", env = "ROS2RTMP_ROS_TYPE")]
    pub message_type: String,

    /// Full stream URL; derived from the base URL and topic when unset
    #[arg(long, env = "RTMP_URL")]
    pub rtmp_url: Option<String>,

    /// Base URL the topic name is appended to
    #[arg(long, env = "RTMP_BASE_URL", default_value = "rtmp://localhost:1935/edge")]
    pub rtmp_base_url: String,

    /// ffmpeg executable used as encoder and decoder
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg_path: String,

    /// Total time allowed for connecting to the stream source, in seconds
    #[arg(long, env = "CONNECT_BUDGET_SECS", default_value = "10")]
    pub connect_budget_secs: u64,

    /// Wait between connection attempts, in milliseconds
    #[arg(long, env = "CONNECT_RETRY_INTERVAL_MS", default_value = "1000")]
    pub connect_retry_interval_ms: u64,

    /// Delay before checking a freshly spawned decoder is alive, in milliseconds
    #[arg(long, env = "LIVENESS_PROBE_MS", default_value = "0")]
    pub liveness_probe_ms: u64,

    /// Time a process gets to exit after SIGTERM, in milliseconds
    #[arg(long, env = "TERMINATION_GRACE_MS", default_value = "2000")]
    pub termination_grace_ms: u64,

    /// Maximum time an encoder may run per message, in seconds (0 = no limit)
    #[arg(long, env = "ENCODER_TIMEOUT_SECS", default_value = "0")]
    pub encoder_timeout_secs: u64,

    /// Messages buffered while the encoder is busy
    #[arg(long, env = "INGEST_QUEUE_DEPTH", default_value = "10")]
    pub ingest_queue_depth: usize,

    /// Bytes per published frame (0 = one frame per pipe read)
    #[arg(long = "frame-size", env = "EGRESS_FRAME_SIZE", default_value = "0")]
    pub frame_size: usize,

    /// Pipe read size for decoder output
    #[arg(long, env = "READ_BUFFER_SIZE", default_value = "65536")]
    pub read_buffer_size: usize,

    /// Extra message types to accept, comma separated
    #[arg(long, env = "EXTRA_MESSAGE_TYPES", value_delimiter = ',')]
    pub extra_types: Vec<String>,

    /// Metrics server port
    #[arg(long, env = "METRICS_PORT", default_value = "9003")]
    pub metrics_port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Minimum allowed port (ports below 1024 are privileged)
const MIN_USER_PORT: u16 = 1024;

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("platform", &self.platform),
            ("mode", &self.mode),
            ("topic", &self.topic),
            ("message type", &self.message_type),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("The {} must not be empty", name);
            }
        }

        self.platform.parse::<Platform>()?;
        self.mode.parse::<Mode>()?;

        let url = self.stream_url();
        if !url.starts_with("rtmp://") && !url.starts_with("rtmps://") {
            anyhow::bail!("Stream URL must start with rtmp:// or rtmps://: {}", url);
        }

        if self.connect_budget_secs == 0 {
            anyhow::bail!("Connect budget cannot be 0");
        }

        if self.connect_retry_interval_ms == 0 {
            anyhow::bail!("Connect retry interval cannot be 0");
        }

        if self.connect_retry_interval_ms > self.connect_budget_secs * 1000 {
            anyhow::bail!(
                "Connect retry interval ({}ms) cannot exceed the connect budget ({}s)",
                self.connect_retry_interval_ms,
                self.connect_budget_secs
            );
        }

        if self.ingest_queue_depth == 0 {
            anyhow::bail!("Ingest queue depth cannot be 0");
        }

        if self.read_buffer_size == 0 {
            anyhow::bail!("Read buffer size cannot be 0");
        }

        Self::validate_port(self.metrics_port, "metrics")?;

        Ok(())
    }

    fn validate_port(port: u16, name: &str) -> anyhow::Result<()> {
        if port == 0 {
            anyhow::bail!("Invalid {} port: port cannot be 0", name);
        }
        if port < MIN_USER_PORT {
            anyhow::bail!(
                "Invalid {} port: {} is a privileged port (< {}). Use a port >= {}",
                name,
                port,
                MIN_USER_PORT,
                MIN_USER_PORT
            );
        }
        Ok(())
    }

    /// Explicit URL, or the base URL with the topic appended
    pub fn stream_url(&self) -> String {
        match &self.rtmp_url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => format!(
                "{}/{}",
                self.rtmp_base_url.trim_end_matches('/'),
                self.topic.trim_start_matches('/')
            ),
        }
    }

    pub fn to_bridge_config(&self) -> crate::domain::errors::Result<BridgeConfig> {
        BridgeConfig::new(
            &self.platform,
            &self.mode,
            self.topic.clone(),
            &self.message_type,
            self.stream_url(),
        )
    }

    pub fn to_retry_policy(&self) -> crate::domain::errors::Result<ConnectRetryPolicy> {
        ConnectRetryPolicy::new(
            Duration::from_millis(self.connect_retry_interval_ms),
            Duration::from_secs(self.connect_budget_secs),
        )
    }

    pub fn to_framing_policy(&self) -> FramingPolicy {
        FramingPolicy::from_frame_size(self.frame_size)
    }

    pub fn to_bridge_options(&self) -> crate::domain::errors::Result<BridgeOptions> {
        Ok(BridgeOptions {
            supervisor: SupervisorOptions {
                retry_policy: self.to_retry_policy()?,
                liveness_probe: Duration::from_millis(self.liveness_probe_ms),
                termination_grace: Duration::from_millis(self.termination_grace_ms),
            },
            framing: self.to_framing_policy(),
            read_buffer_size: self.read_buffer_size,
            encoder_timeout: (self.encoder_timeout_secs > 0)
                .then(|| Duration::from_secs(self.encoder_timeout_secs)),
            ingest_queue_depth: self.ingest_queue_depth,
        })
    }

    /// Default types plus any configured extras
    pub fn to_type_registry(&self) -> crate::domain::errors::Result<TypeRegistry> {
        let mut registry = TypeRegistry::with_defaults();
        for name in self.extra_types.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            registry.register_raw(name)?;
        }
        Ok(registry)
    }
}
