use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{ProcessSupervisor, StreamAdapter, SupervisorOptions, DEFAULT_READ_BUFFER_SIZE};
use crate::domain::entities::TypeRegistry;
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{
    Clock, MessageBus, MessageCallback, MetricsReporter, ProcessLauncher, SubscriptionId,
    TypeDescriptor,
};
use crate::domain::value_objects::{BridgeConfig, Direction, FramingPolicy, StreamFrame};

/// Timeout for ingest queue polling (100ms allows responsive shutdown)
const QUEUE_POLL_TIMEOUT_MS: u64 = 100;

/// Runtime tuning for a bridge instance
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOptions {
    pub supervisor: SupervisorOptions,
    pub framing: FramingPolicy,
    pub read_buffer_size: usize,
    pub encoder_timeout: Option<Duration>,
    pub ingest_queue_depth: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            supervisor: SupervisorOptions::default(),
            framing: FramingPolicy::PassThrough,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            encoder_timeout: None,
            ingest_queue_depth: 10,
        }
    }
}

/// External collaborators injected at startup
pub struct BridgeDependencies {
    pub registry: TypeRegistry,
    pub bus: Arc<dyn MessageBus>,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<dyn MetricsReporter>,
}

/// Stops a running bridge from another thread (e.g. a signal handler)
#[derive(Clone)]
pub struct BridgeStopHandle {
    running: Arc<AtomicBool>,
    supervisor: Arc<ProcessSupervisor>,
}

impl BridgeStopHandle {
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!("Bridge stop requested");
        }
        self.supervisor.terminate_active();
    }
}

/// Top-level coordinator wiring the bus to the external media process
pub struct BridgeController {
    config: BridgeConfig,
    direction: Direction,
    bus: Arc<dyn MessageBus>,
    supervisor: Arc<ProcessSupervisor>,
    running: Arc<AtomicBool>,
    subscription: Option<SubscriptionId>,
    worker: Option<JoinHandle<Result<()>>>,
}

impl BridgeController {
    /// Resolve the data flow and start it.
    ///
    /// Type resolution happens before anything is registered on the bus, so a
    /// failure here leaves no partial bridge behind.
    pub fn initialize(
        config: BridgeConfig,
        options: BridgeOptions,
        deps: BridgeDependencies,
    ) -> Result<Self> {
        let direction = config.direction();

        let descriptor = deps.registry.resolve(config.message_type()).map_err(|e| {
            tracing::error!(
                topic = %config.topic(),
                direction = %direction,
                stage = "startup",
                "Failed to resolve message type: {}",
                e
            );
            e
        })?;

        tracing::info!(
            topic = %config.topic(),
            direction = %direction,
            platform = %config.platform(),
            mode = %config.mode(),
            "Starting bridge for {} ({}) <-> {}",
            config.topic(),
            descriptor.name,
            config.stream_url()
        );

        let supervisor = Arc::new(ProcessSupervisor::new(
            config.stream_url().to_string(),
            deps.launcher,
            deps.clock,
            deps.metrics.clone(),
            options.supervisor.clone(),
        ));
        let adapter = Arc::new(StreamAdapter::new(
            supervisor.clone(),
            deps.metrics.clone(),
            options.framing,
            options.read_buffer_size,
            options.encoder_timeout,
        ));

        let mut controller = Self {
            config,
            direction,
            bus: deps.bus,
            supervisor,
            running: Arc::new(AtomicBool::new(true)),
            subscription: None,
            worker: None,
        };

        match direction {
            Direction::Ingest => controller.start_ingest(
                adapter,
                descriptor,
                deps.metrics,
                options.ingest_queue_depth,
            )?,
            Direction::Egress => controller.start_egress(adapter, descriptor, deps.metrics)?,
        }

        Ok(controller)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop_handle(&self) -> BridgeStopHandle {
        BridgeStopHandle {
            running: self.running.clone(),
            supervisor: self.supervisor.clone(),
        }
    }

    /// Block until the bridge's worker finishes, returning its outcome
    pub fn wait(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(worker) => worker.join().unwrap_or_else(|_| {
                tracing::error!(topic = %self.config.topic(), "Bridge worker panicked");
                Err(DomainError::BridgeNotRunning)
            }),
            None => Ok(()),
        }
    }

    /// Wait for the worker, then release everything.
    ///
    /// A worker that ended because a stop was requested counts as success;
    /// any other failure (such as an exhausted connect budget) is returned.
    pub fn run_to_completion(&mut self) -> Result<()> {
        let result = self.wait();
        let stopped = !self.is_running();
        self.shutdown();
        match result {
            Err(DomainError::BridgeNotRunning) if stopped => Ok(()),
            other => other,
        }
    }

    /// Stop the flow, kill any live process, and unregister from the bus.
    ///
    /// Safe to call at any point and more than once.
    pub fn shutdown(&mut self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);

        if let Some(id) = self.subscription.take() {
            if let Err(e) = self.bus.unsubscribe(id) {
                tracing::warn!(topic = %self.config.topic(), "Failed to unsubscribe: {}", e);
            }
        }

        self.supervisor.terminate_active();

        if let Err(e) = self.wait() {
            if !matches!(e, DomainError::BridgeNotRunning) {
                tracing::debug!(topic = %self.config.topic(), "Worker ended with: {}", e);
            }
        }

        if was_running {
            tracing::info!(
                topic = %self.config.topic(),
                direction = %self.direction,
                "Bridge shut down"
            );
        }
    }

    fn start_ingest(
        &mut self,
        adapter: Arc<StreamAdapter>,
        descriptor: TypeDescriptor,
        metrics: Arc<dyn MetricsReporter>,
        queue_depth: usize,
    ) -> Result<()> {
        let (tx, rx) = mpsc::sync_channel::<StreamFrame>(queue_depth.max(1));

        let running = self.running.clone();
        let topic = self.config.topic().to_string();
        let worker_metrics = metrics.clone();
        let worker = thread::Builder::new()
            .name("ingest-worker".to_string())
            .spawn(move || {
                let timeout = Duration::from_millis(QUEUE_POLL_TIMEOUT_MS);
                while running.load(Ordering::SeqCst) {
                    match rx.recv_timeout(timeout) {
                        Ok(frame) => {
                            if let Err(e) = adapter.adapt(frame) {
                                tracing::error!(
                                    topic = %topic,
                                    direction = %Direction::Ingest,
                                    stage = "encode",
                                    "Dropping message: {}",
                                    e
                                );
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                let mut abandoned = 0usize;
                while rx.try_recv().is_ok() {
                    worker_metrics.report_frame_dropped();
                    abandoned += 1;
                }
                if abandoned > 0 {
                    tracing::warn!(
                        topic = %topic,
                        direction = %Direction::Ingest,
                        stage = "shutdown",
                        "Dropped {} queued messages on shutdown",
                        abandoned
                    );
                }
                Ok(())
            })
            .map_err(|e| DomainError::ProcessSpawnFailed(format!("ingest worker: {}", e)))?;
        self.worker = Some(worker);

        let codec = descriptor.codec.clone();
        let topic = self.config.topic().to_string();
        let callback: MessageCallback = Box::new(move |message: &[u8]| {
            let payload = match codec.serialize(message) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(
                        topic = %topic,
                        direction = %Direction::Ingest,
                        stage = "serialize",
                        "Dropping message: {}",
                        e
                    );
                    metrics.report_frame_dropped();
                    return;
                }
            };

            match tx.try_send(StreamFrame::new(payload)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        topic = %topic,
                        direction = %Direction::Ingest,
                        stage = "enqueue",
                        "Encoder busy and queue full, dropping message"
                    );
                    metrics.report_frame_dropped();
                }
                Err(TrySendError::Disconnected(_)) => {
                    tracing::warn!(
                        topic = %topic,
                        direction = %Direction::Ingest,
                        stage = "enqueue",
                        "Ingest worker stopped, dropping message"
                    );
                    metrics.report_frame_dropped();
                }
            }
        });

        match self
            .bus
            .subscribe(self.config.topic(), &descriptor, callback)
        {
            Ok(id) => {
                tracing::info!(
                    topic = %self.config.topic(),
                    direction = %Direction::Ingest,
                    "Subscribed; each message is encoded to the stream"
                );
                self.subscription = Some(id);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    topic = %self.config.topic(),
                    direction = %Direction::Ingest,
                    stage = "subscribe",
                    "Failed to subscribe: {}",
                    e
                );
                self.shutdown();
                Err(e)
            }
        }
    }

    fn start_egress(
        &mut self,
        adapter: Arc<StreamAdapter>,
        descriptor: TypeDescriptor,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Result<()> {
        let running = self.running.clone();
        let supervisor = self.supervisor.clone();
        let bus = self.bus.clone();
        let topic = self.config.topic().to_string();

        let worker = thread::Builder::new()
            .name("egress-worker".to_string())
            .spawn(move || {
                let mut session = supervisor.connect_decoder(&running).map_err(|e| {
                    tracing::error!(
                        topic = %topic,
                        direction = %Direction::Egress,
                        stage = "connect",
                        "Stream source unavailable, bridge is idle: {}",
                        e
                    );
                    e
                })?;

                let publisher = match bus.advertise(&topic, &descriptor) {
                    Ok(publisher) => publisher,
                    Err(e) => {
                        tracing::error!(
                            topic = %topic,
                            direction = %Direction::Egress,
                            stage = "advertise",
                            "Failed to advertise topic: {}",
                            e
                        );
                        session.terminate();
                        return Err(e);
                    }
                };

                let codec = descriptor.codec.clone();
                let result = adapter.run(&mut session, &running, |frame| {
                    let sent = codec
                        .deserialize(frame.as_bytes())
                        .and_then(|message| publisher.send(&message));
                    if let Err(e) = sent {
                        tracing::warn!(
                            topic = %topic,
                            direction = %Direction::Egress,
                            stage = "publish",
                            "Dropping frame: {}",
                            e
                        );
                        metrics.report_frame_dropped();
                    }
                });

                match &result {
                    Ok(summary) => tracing::info!(
                        topic = %topic,
                        direction = %Direction::Egress,
                        "Published {} frames ({} bytes)",
                        summary.frames,
                        summary.bytes
                    ),
                    Err(e) => tracing::error!(
                        topic = %topic,
                        direction = %Direction::Egress,
                        stage = "stream",
                        "Egress stream failed: {}",
                        e
                    ),
                }

                result.map(|_| ())
            })
            .map_err(|e| DomainError::ProcessSpawnFailed(format!("egress worker: {}", e)))?;

        self.worker = Some(worker);
        Ok(())
    }
}

impl Drop for BridgeController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
