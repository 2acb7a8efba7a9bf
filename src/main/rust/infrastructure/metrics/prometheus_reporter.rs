use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};

use crate::domain::ports::MetricsReporter;
use crate::domain::value_objects::SessionState;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Session state (0=Idle, 1=Starting, 2=Connected, 3=Retrying, 4=Streaming, 5=Stopped, 6=Failed)
    pub static ref SESSION_STATE: Gauge = Gauge::new(
        "bridge_session_state",
        "Current external process session state"
    ).expect("metric can be created");

    pub static ref CONNECT_ATTEMPTS: IntCounter = IntCounter::new(
        "bridge_connect_attempts_total",
        "Total number of stream source connection attempts"
    ).expect("metric can be created");

    pub static ref PROCESS_SPAWNS: IntCounter = IntCounter::new(
        "bridge_process_spawns_total",
        "Total number of encoder/decoder processes launched"
    ).expect("metric can be created");

    pub static ref FRAMES_INGESTED: IntCounter = IntCounter::new(
        "bridge_frames_ingested_total",
        "Bus messages written to an encoder"
    ).expect("metric can be created");

    pub static ref BYTES_INGESTED: IntCounter = IntCounter::new(
        "bridge_bytes_ingested_total",
        "Payload bytes written to encoders"
    ).expect("metric can be created");

    pub static ref FRAMES_EMITTED: IntCounter = IntCounter::new(
        "bridge_frames_emitted_total",
        "Frames read from the decoder and handed to the bus"
    ).expect("metric can be created");

    pub static ref BYTES_EMITTED: IntCounter = IntCounter::new(
        "bridge_bytes_emitted_total",
        "Decoder output bytes handed to the bus"
    ).expect("metric can be created");

    pub static ref FRAMES_DROPPED: IntCounter = IntCounter::new(
        "bridge_frames_dropped_total",
        "Messages or frames dropped on either path"
    ).expect("metric can be created");

    pub static ref UPTIME_SECONDS: Gauge = Gauge::new(
        "bridge_session_uptime_seconds",
        "Time since the current session connected"
    ).expect("metric can be created");
}

pub struct PrometheusReporter;

impl PrometheusReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn init_metrics() -> Result<(), prometheus::Error> {
        REGISTRY.register(Box::new(SESSION_STATE.clone()))?;
        REGISTRY.register(Box::new(CONNECT_ATTEMPTS.clone()))?;
        REGISTRY.register(Box::new(PROCESS_SPAWNS.clone()))?;
        REGISTRY.register(Box::new(FRAMES_INGESTED.clone()))?;
        REGISTRY.register(Box::new(BYTES_INGESTED.clone()))?;
        REGISTRY.register(Box::new(FRAMES_EMITTED.clone()))?;
        REGISTRY.register(Box::new(BYTES_EMITTED.clone()))?;
        REGISTRY.register(Box::new(FRAMES_DROPPED.clone()))?;
        REGISTRY.register(Box::new(UPTIME_SECONDS.clone()))?;
        Ok(())
    }

    pub fn gather_metrics() -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = vec![];
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return b"# Error encoding metrics\n".to_vec();
        }
        buffer
    }
}

impl Default for PrometheusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsReporter for PrometheusReporter {
    fn report_state_change(&self, state: &SessionState) {
        SESSION_STATE.set(state.as_metric());
    }

    fn report_connect_attempt(&self) {
        CONNECT_ATTEMPTS.inc();
    }

    fn report_process_spawned(&self) {
        PROCESS_SPAWNS.inc();
    }

    fn report_frame_ingested(&self, bytes: usize) {
        FRAMES_INGESTED.inc();
        BYTES_INGESTED.inc_by(bytes as u64);
    }

    fn report_frame_emitted(&self, bytes: usize) {
        FRAMES_EMITTED.inc();
        BYTES_EMITTED.inc_by(bytes as u64);
    }

    fn report_frame_dropped(&self) {
        FRAMES_DROPPED.inc();
    }

    fn report_uptime(&self, uptime_secs: f64) {
        UPTIME_SECONDS.set(uptime_secs);
    }
}
