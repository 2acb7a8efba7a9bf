use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ros2rtmp_bridge::application::services::DEFAULT_READ_BUFFER_SIZE;
use ros2rtmp_bridge::{
    BridgeConfig, BridgeController, BridgeDependencies, BridgeOptions, ChildProcess, Clock,
    Direction, DomainError, FramingPolicy, InMemoryBus, MetricsReporter, ProcessExit,
    ProcessLauncher, ProcessSupervisor, SessionState, StreamAdapter, StreamFrame,
    SupervisorOptions, TypeRegistry,
};

const STREAM_URL: &str = "rtmp://localhost:1935/edge/camera";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ChildState {
    exit: Mutex<Option<ProcessExit>>,
    stdin: Mutex<Vec<u8>>,
    stdin_closed: AtomicBool,
    terminate_signals: AtomicUsize,
}

impl ChildState {
    fn exited_with(code: Option<i32>) -> Arc<Self> {
        let state = Self::default();
        *state.exit.lock().unwrap() = Some(ProcessExit { code });
        Arc::new(state)
    }

    fn set_exit(&self, code: Option<i32>) {
        let mut exit = self.exit.lock().unwrap();
        if exit.is_none() {
            *exit = Some(ProcessExit { code });
        }
    }

    fn has_exited(&self) -> bool {
        self.exit.lock().unwrap().is_some()
    }

    fn written(&self) -> Vec<u8> {
        self.stdin.lock().unwrap().clone()
    }
}

/// Records writes; unless told to hang, the process "exits" once its input is closed
struct RecordingInput {
    state: Arc<ChildState>,
    exit_on_close: bool,
}

impl Write for RecordingInput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.stdin.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for RecordingInput {
    fn drop(&mut self) {
        self.state.stdin_closed.store(true, Ordering::SeqCst);
        if self.exit_on_close {
            self.state.set_exit(Some(0));
        }
    }
}

#[derive(Clone)]
enum Output {
    /// One chunk per read, then end of output and a clean exit
    Chunks(Vec<Vec<u8>>),
    /// Keeps producing until the process is stopped
    Endless(Vec<u8>),
}

struct ScriptedOutput {
    state: Arc<ChildState>,
    chunks: VecDeque<Vec<u8>>,
    endless: Option<Vec<u8>>,
}

impl Read for ScriptedOutput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.state.has_exited() {
            return Ok(0);
        }
        if let Some(chunk) = &self.endless {
            std::thread::sleep(Duration::from_millis(5));
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            return Ok(n);
        }
        match self.chunks.pop_front() {
            Some(chunk) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            None => {
                self.state.set_exit(Some(0));
                Ok(0)
            }
        }
    }
}

struct FakeChild {
    state: Arc<ChildState>,
    stdin: Option<Box<dyn Write + Send>>,
    stdout: Option<Box<dyn Read + Send>>,
}

impl ChildProcess for FakeChild {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    fn take_stdin(&mut self) -> Option<Box<dyn Write + Send>> {
        self.stdin.take()
    }

    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stdout.take()
    }

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(*self.state.exit.lock().unwrap())
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.state.terminate_signals.fetch_add(1, Ordering::SeqCst);
        self.state.set_exit(None);
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.state.set_exit(None);
        Ok(())
    }
}

enum Failure {
    /// The process starts but dies at once (source not reachable yet)
    ExitImmediately,
    /// The program cannot be started at all
    SpawnError,
}

struct FakeLauncher {
    failing_launches: usize,
    failure: Failure,
    output: Output,
    encoder_hangs: bool,
    launches: AtomicUsize,
    children: Mutex<Vec<Arc<ChildState>>>,
}

impl FakeLauncher {
    fn healthy(output: Output) -> Self {
        Self::failing_first(0, output)
    }

    fn failing_first(failing_launches: usize, output: Output) -> Self {
        Self {
            failing_launches,
            failure: Failure::ExitImmediately,
            output,
            encoder_hangs: false,
            launches: AtomicUsize::new(0),
            children: Mutex::new(Vec::new()),
        }
    }

    fn always_failing(failure: Failure) -> Self {
        Self {
            failing_launches: usize::MAX,
            failure,
            output: Output::Chunks(Vec::new()),
            encoder_hangs: false,
            launches: AtomicUsize::new(0),
            children: Mutex::new(Vec::new()),
        }
    }

    /// Encoders keep running after their input closes, until terminated
    fn with_hanging_encoder(mut self) -> Self {
        self.encoder_hangs = true;
        self
    }

    fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Children that came up healthy
    fn children(&self) -> Vec<Arc<ChildState>> {
        self.children.lock().unwrap().clone()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, direction: Direction, stream_url: &str) -> io::Result<Box<dyn ChildProcess>> {
        assert_eq!(stream_url, STREAM_URL);
        let launch = self.launches.fetch_add(1, Ordering::SeqCst) + 1;

        if launch <= self.failing_launches {
            return match self.failure {
                Failure::SpawnError => Err(io::Error::new(io::ErrorKind::NotFound, "no such program")),
                Failure::ExitImmediately => Ok(Box::new(FakeChild {
                    state: ChildState::exited_with(Some(1)),
                    stdin: None,
                    stdout: None,
                })),
            };
        }

        let state = Arc::new(ChildState::default());
        self.children.lock().unwrap().push(state.clone());

        let (stdin, stdout): (Option<Box<dyn Write + Send>>, Option<Box<dyn Read + Send>>) =
            match direction {
                Direction::Ingest => {
                    let input: Box<dyn Write + Send> = Box::new(RecordingInput {
                        state: state.clone(),
                        exit_on_close: !self.encoder_hangs,
                    });
                    (Some(input), None)
                }
                Direction::Egress => {
                    let output = match &self.output {
                        Output::Chunks(chunks) => ScriptedOutput {
                            state: state.clone(),
                            chunks: chunks.iter().cloned().collect(),
                            endless: None,
                        },
                        Output::Endless(chunk) => ScriptedOutput {
                            state: state.clone(),
                            chunks: VecDeque::new(),
                            endless: Some(chunk.clone()),
                        },
                    };
                    let output: Box<dyn Read + Send> = Box::new(output);
                    (None, Some(output))
                }
            };

        Ok(Box::new(FakeChild { state, stdin, stdout }))
    }
}

/// Virtual time: sleeping advances the clock instantly
struct FakeClock {
    base: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
        self.sleeps.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
struct RecordingMetrics {
    states: Mutex<Vec<SessionState>>,
    connect_attempts: AtomicUsize,
    spawns: AtomicUsize,
    ingested: AtomicUsize,
    emitted: AtomicUsize,
    dropped: AtomicUsize,
}

impl MetricsReporter for RecordingMetrics {
    fn report_state_change(&self, state: &SessionState) {
        self.states.lock().unwrap().push(*state);
    }

    fn report_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
    }

    fn report_process_spawned(&self) {
        self.spawns.fetch_add(1, Ordering::SeqCst);
    }

    fn report_frame_ingested(&self, _bytes: usize) {
        self.ingested.fetch_add(1, Ordering::SeqCst);
    }

    fn report_frame_emitted(&self, _bytes: usize) {
        self.emitted.fetch_add(1, Ordering::SeqCst);
    }

    fn report_frame_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }

    fn report_uptime(&self, _uptime_secs: f64) {}
}

struct Harness {
    launcher: Arc<FakeLauncher>,
    clock: Arc<FakeClock>,
    metrics: Arc<RecordingMetrics>,
    supervisor: Arc<ProcessSupervisor>,
}

impl Harness {
    fn new(launcher: FakeLauncher) -> Self {
        let launcher = Arc::new(launcher);
        let clock = Arc::new(FakeClock::new());
        let metrics = Arc::new(RecordingMetrics::default());
        let supervisor = Arc::new(ProcessSupervisor::new(
            STREAM_URL.to_string(),
            launcher.clone(),
            clock.clone(),
            metrics.clone(),
            SupervisorOptions::default(),
        ));
        Self {
            launcher,
            clock,
            metrics,
            supervisor,
        }
    }

    fn adapter(&self, framing: FramingPolicy) -> StreamAdapter {
        StreamAdapter::new(
            self.supervisor.clone(),
            self.metrics.clone(),
            framing,
            DEFAULT_READ_BUFFER_SIZE,
            None,
        )
    }
}

fn bridge_config(platform: &str, mode: &str, message_type: &str) -> BridgeConfig {
    BridgeConfig::new(
        platform,
        mode,
        "camera".to_string(),
        message_type,
        STREAM_URL.to_string(),
    )
    .unwrap()
}

fn start_controller(
    platform: &str,
    mode: &str,
    message_type: &str,
    launcher: FakeLauncher,
) -> (
    ros2rtmp_bridge::Result<BridgeController>,
    Arc<FakeLauncher>,
    InMemoryBus,
) {
    let launcher = Arc::new(launcher);
    let bus = InMemoryBus::new();
    let deps = BridgeDependencies {
        registry: TypeRegistry::with_defaults(),
        bus: Arc::new(bus.clone()),
        launcher: launcher.clone(),
        clock: Arc::new(FakeClock::new()),
        metrics: Arc::new(RecordingMetrics::default()),
    };
    let started = BridgeController::initialize(
        bridge_config(platform, mode, message_type),
        BridgeOptions::default(),
        deps,
    );
    (started, launcher, bus)
}

/// Poll `condition` in real time until it holds or two seconds pass
fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// ---------------------------------------------------------------------------
// Direction resolution
// ---------------------------------------------------------------------------

#[test]
fn test_direction_table() {
    let cases = [
        ("edge", "pub", Direction::Egress),
        ("edge", "sub", Direction::Ingest),
        ("user", "pub", Direction::Ingest),
        ("user", "sub", Direction::Egress),
    ];
    for (platform, mode, expected) in cases {
        assert_eq!(
            Direction::resolve_labels(platform, mode).unwrap(),
            expected,
            "{}/{}",
            platform,
            mode
        );
    }

    assert!(Direction::resolve_labels("cloud", "pub").is_err());
    assert!(Direction::resolve_labels("edge", "both").is_err());
}

// ---------------------------------------------------------------------------
// Process supervisor
// ---------------------------------------------------------------------------

#[test]
fn test_decoder_connects_after_failed_attempts() {
    let harness = Harness::new(FakeLauncher::failing_first(2, Output::Chunks(Vec::new())));
    let running = AtomicBool::new(true);

    let session = harness.supervisor.connect_decoder(&running).unwrap();

    assert_eq!(harness.launcher.launches(), 3);
    assert_eq!(harness.clock.sleeps(), vec![Duration::from_secs(1); 2]);
    assert_eq!(harness.metrics.connect_attempts.load(Ordering::SeqCst), 3);
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.direction(), Direction::Egress);
    assert!(harness
        .metrics
        .states
        .lock()
        .unwrap()
        .contains(&SessionState::Retrying { attempt: 2 }));
}

#[test]
fn test_decoder_gives_up_after_connect_budget() {
    let harness = Harness::new(FakeLauncher::always_failing(Failure::ExitImmediately));
    let running = AtomicBool::new(true);

    let result = harness.supervisor.connect_decoder(&running);

    match result {
        Err(DomainError::ConnectionTimeout { budget, attempts }) => {
            assert_eq!(budget, Duration::from_secs(10));
            assert_eq!(attempts, 10);
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("decoder should not connect"),
    }
    assert_eq!(harness.launcher.launches(), 10);
    assert_eq!(harness.clock.sleeps(), vec![Duration::from_secs(1); 10]);
    assert_eq!(
        harness.metrics.states.lock().unwrap().last(),
        Some(&SessionState::Failed)
    );
}

#[test]
fn test_decoder_connect_skipped_when_not_running() {
    let harness = Harness::new(FakeLauncher::healthy(Output::Chunks(Vec::new())));
    let running = AtomicBool::new(false);

    let result = harness.supervisor.connect_decoder(&running);

    assert!(matches!(result, Err(DomainError::BridgeNotRunning)));
    assert_eq!(harness.launcher.launches(), 0);
}

#[test]
fn test_terminate_is_idempotent() {
    let harness = Harness::new(FakeLauncher::healthy(Output::Chunks(Vec::new())));
    let mut session = harness.supervisor.start_encoder().unwrap();
    let control = session.control();

    control.terminate();
    control.terminate();
    session.terminate();
    drop(session);
    harness.supervisor.terminate_active();

    let child = &harness.launcher.children()[0];
    assert_eq!(child.terminate_signals.load(Ordering::SeqCst), 1);
    assert_eq!(control.state(), SessionState::Stopped);
}

// ---------------------------------------------------------------------------
// Stream adapter
// ---------------------------------------------------------------------------

#[test]
fn test_ingest_writes_whole_payload_to_one_encoder() {
    let harness = Harness::new(FakeLauncher::healthy(Output::Chunks(Vec::new())));
    let adapter = harness.adapter(FramingPolicy::PassThrough);
    let payload: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();

    let exit = adapter.adapt(StreamFrame::new(payload.clone())).unwrap();

    assert_eq!(exit, Some(ProcessExit { code: Some(0) }));
    assert_eq!(harness.launcher.launches(), 1);
    let child = &harness.launcher.children()[0];
    assert_eq!(child.written(), payload);
    assert!(child.stdin_closed.load(Ordering::SeqCst));
    assert_eq!(child.terminate_signals.load(Ordering::SeqCst), 0);
    assert_eq!(harness.metrics.ingested.load(Ordering::SeqCst), 1);
}

#[test]
fn test_ingest_spawns_a_fresh_encoder_per_message() {
    let harness = Harness::new(FakeLauncher::healthy(Output::Chunks(Vec::new())));
    let adapter = harness.adapter(FramingPolicy::PassThrough);

    adapter.adapt(StreamFrame::from(&b"first"[..])).unwrap();
    adapter.adapt(StreamFrame::from(&b"second"[..])).unwrap();

    let children = harness.launcher.children();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].written(), b"first");
    assert_eq!(children[1].written(), b"second");
}

#[test]
fn test_ingest_spawn_failure_writes_nothing() {
    let harness = Harness::new(FakeLauncher::always_failing(Failure::SpawnError));
    let adapter = harness.adapter(FramingPolicy::PassThrough);

    let result = adapter.adapt(StreamFrame::from(&b"payload"[..]));

    assert!(matches!(result, Err(DomainError::ProcessSpawnFailed(_))));
    assert_eq!(harness.launcher.launches(), 1);
    assert!(harness.launcher.children().is_empty());
    assert_eq!(harness.metrics.ingested.load(Ordering::SeqCst), 0);
    assert!(harness.clock.sleeps().is_empty());
}

#[test]
fn test_egress_emits_chunks_in_order() {
    let chunks = vec![b"b1".to_vec(), b"b2".to_vec(), b"b3".to_vec()];
    let harness = Harness::new(FakeLauncher::healthy(Output::Chunks(chunks.clone())));
    let adapter = harness.adapter(FramingPolicy::PassThrough);
    let running = AtomicBool::new(true);

    let mut session = harness.supervisor.connect_decoder(&running).unwrap();
    let mut emitted = Vec::new();
    let summary = adapter
        .run(&mut session, &running, |frame| emitted.push(frame.into_bytes()))
        .unwrap();

    assert_eq!(emitted, chunks);
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.bytes, 6);
    assert!(!summary.cancelled);
    assert_eq!(summary.exit, Some(ProcessExit { code: Some(0) }));
    assert_eq!(harness.metrics.emitted.load(Ordering::SeqCst), 3);
    assert_eq!(session.state(), SessionState::Stopped);
}

#[test]
fn test_egress_fixed_size_framing() {
    let chunks = vec![b"abc".to_vec(), b"defg".to_vec(), b"hij".to_vec()];
    let harness = Harness::new(FakeLauncher::healthy(Output::Chunks(chunks)));
    let adapter = harness.adapter(FramingPolicy::fixed(4).unwrap());
    let running = AtomicBool::new(true);

    let mut session = harness.supervisor.connect_decoder(&running).unwrap();
    let mut emitted = Vec::new();
    let summary = adapter
        .run(&mut session, &running, |frame| emitted.push(frame.into_bytes()))
        .unwrap();

    assert_eq!(emitted, vec![b"abcd".to_vec(), b"efgh".to_vec()]);
    assert_eq!(summary.bytes, 8);
}

#[test]
fn test_egress_stops_when_cancelled() {
    let harness = Harness::new(FakeLauncher::healthy(Output::Endless(b"x".to_vec())));
    let adapter = harness.adapter(FramingPolicy::PassThrough);
    let running = AtomicBool::new(true);

    let mut session = harness.supervisor.connect_decoder(&running).unwrap();
    let mut count = 0;
    let summary = adapter
        .run(&mut session, &running, |_| {
            count += 1;
            if count == 3 {
                running.store(false, Ordering::SeqCst);
            }
        })
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.frames, 3);
    let child = &harness.launcher.children()[0];
    assert_eq!(child.terminate_signals.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Bridge controller
// ---------------------------------------------------------------------------

#[test]
fn test_controller_ingest_end_to_end() {
    let (started, launcher, bus) = start_controller(
        "edge",
        "sub",
        "sensor_msgs/Image",
        FakeLauncher::healthy(Output::Chunks(Vec::new())),
    );
    let mut controller = started.unwrap();
    assert_eq!(controller.direction(), Direction::Ingest);
    assert_eq!(bus.subscriber_count("camera"), 1);

    bus.publish("camera", b"\x00\x01image-bytes");

    assert!(eventually(|| launcher
        .children()
        .first()
        .is_some_and(|child| child.has_exited())));
    assert_eq!(launcher.launches(), 1);
    assert_eq!(launcher.children()[0].written(), b"\x00\x01image-bytes");
    assert!(bus.published("camera").is_empty());
    assert_eq!(bus.publisher_count("camera"), 0);

    controller.shutdown();
    assert_eq!(bus.subscriber_count("camera"), 0);
}

#[test]
fn test_controller_egress_end_to_end() {
    let chunks = vec![b"f1".to_vec(), b"f2".to_vec(), b"f3".to_vec()];
    let (started, launcher, bus) = start_controller(
        "user",
        "sub",
        "sensor_msgs/Image",
        FakeLauncher::healthy(Output::Chunks(chunks.clone())),
    );
    let mut controller = started.unwrap();
    assert_eq!(controller.direction(), Direction::Egress);

    assert!(controller.wait().is_ok());
    assert_eq!(bus.published("camera"), chunks);
    assert_eq!(bus.subscriber_count("camera"), 0);
    assert_eq!(launcher.launches(), 1);
}

#[test]
fn test_controller_unknown_type_fails_before_subscribing() {
    let (started, launcher, bus) = start_controller(
        "edge",
        "sub",
        "sensor_msgs/Unknown",
        FakeLauncher::healthy(Output::Chunks(Vec::new())),
    );

    assert!(matches!(started, Err(DomainError::MessageTypeNotFound(_))));
    assert_eq!(bus.subscriber_count("camera"), 0);
    assert_eq!(launcher.launches(), 0);
}

#[test]
fn test_controller_egress_timeout_leaves_bridge_idle() {
    let (started, launcher, bus) = start_controller(
        "edge",
        "pub",
        "sensor_msgs/Image",
        FakeLauncher::always_failing(Failure::ExitImmediately),
    );
    let mut controller = started.unwrap();

    let result = controller.wait();

    assert!(matches!(
        result,
        Err(DomainError::ConnectionTimeout { attempts: 10, .. })
    ));
    assert_eq!(launcher.launches(), 10);
    assert_eq!(bus.publisher_count("camera"), 0);
    assert!(bus.published("camera").is_empty());
}

#[test]
fn test_controller_stop_handle_ends_egress_stream() {
    let (started, launcher, bus) = start_controller(
        "user",
        "sub",
        "sensor_msgs/Image",
        FakeLauncher::healthy(Output::Endless(b"frame".to_vec())),
    );
    let mut controller = started.unwrap();

    assert!(eventually(|| !bus.published("camera").is_empty()));
    controller.stop_handle().stop();

    assert!(controller.wait().is_ok());
    assert!(!controller.is_running());
    let child = &launcher.children()[0];
    assert_eq!(child.terminate_signals.load(Ordering::SeqCst), 1);
}

#[test]
fn test_controller_shutdown_twice_is_safe() {
    let (started, _launcher, bus) = start_controller(
        "user",
        "pub",
        "std_msgs/String",
        FakeLauncher::healthy(Output::Chunks(Vec::new())),
    );
    let mut controller = started.unwrap();
    assert!(controller.is_running());

    controller.shutdown();
    controller.shutdown();

    assert!(!controller.is_running());
    assert_eq!(bus.subscriber_count("camera"), 0);
}

#[test]
fn test_controller_counts_queued_messages_dropped_on_shutdown() {
    let launcher = Arc::new(
        FakeLauncher::healthy(Output::Chunks(Vec::new())).with_hanging_encoder(),
    );
    let metrics = Arc::new(RecordingMetrics::default());
    let bus = InMemoryBus::new();
    let deps = BridgeDependencies {
        registry: TypeRegistry::with_defaults(),
        bus: Arc::new(bus.clone()),
        launcher: launcher.clone(),
        clock: Arc::new(ros2rtmp_bridge::SystemClock),
        metrics: metrics.clone(),
    };
    let mut controller = BridgeController::initialize(
        bridge_config("edge", "sub", "sensor_msgs/Image"),
        BridgeOptions::default(),
        deps,
    )
    .unwrap();

    bus.publish("camera", b"first");
    assert!(eventually(|| launcher.children().len() == 1));
    bus.publish("camera", b"second");
    bus.publish("camera", b"third");

    controller.shutdown();

    assert_eq!(launcher.launches(), 1);
    assert_eq!(metrics.dropped.load(Ordering::SeqCst), 2);
    let child = &launcher.children()[0];
    assert_eq!(child.written(), b"first");
    assert_eq!(child.terminate_signals.load(Ordering::SeqCst), 1);
}

#[test]
fn test_run_to_completion_reports_connect_timeout() {
    let (started, _launcher, bus) = start_controller(
        "edge",
        "pub",
        "sensor_msgs/Image",
        FakeLauncher::always_failing(Failure::ExitImmediately),
    );
    let mut controller = started.unwrap();

    let result = controller.run_to_completion();

    assert!(matches!(
        result,
        Err(DomainError::ConnectionTimeout { attempts: 10, .. })
    ));
    assert!(!controller.is_running());
    assert_eq!(bus.publisher_count("camera"), 0);
}

#[test]
fn test_run_to_completion_after_stop_is_ok() {
    let (started, launcher, bus) = start_controller(
        "user",
        "sub",
        "sensor_msgs/Image",
        FakeLauncher::healthy(Output::Endless(b"frame".to_vec())),
    );
    let mut controller = started.unwrap();

    assert!(eventually(|| !bus.published("camera").is_empty()));
    controller.stop_handle().stop();

    assert!(controller.run_to_completion().is_ok());
    assert_eq!(
        launcher.children()[0].terminate_signals.load(Ordering::SeqCst),
        1
    );
}

// ---------------------------------------------------------------------------
// Real processes
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod os_processes {
    use super::*;
    use ros2rtmp_bridge::infrastructure::ffmpeg::CommandTemplate;
    use ros2rtmp_bridge::{OsProcessLauncher, SystemClock};

    fn supervisor(launcher: OsProcessLauncher) -> Arc<ProcessSupervisor> {
        Arc::new(ProcessSupervisor::new(
            STREAM_URL.to_string(),
            Arc::new(launcher),
            Arc::new(SystemClock),
            Arc::new(RecordingMetrics::default()),
            SupervisorOptions::default(),
        ))
    }

    #[test]
    fn test_encoder_receives_payload_through_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let script = format!("cat > '{}'", path.display());
        let launcher = OsProcessLauncher::new(
            CommandTemplate::new("sh", ["-c", script.as_str()]),
            CommandTemplate::new("sh", ["-c", "exit 1"]),
        );
        let adapter = StreamAdapter::new(
            supervisor(launcher),
            Arc::new(RecordingMetrics::default()),
            FramingPolicy::PassThrough,
            DEFAULT_READ_BUFFER_SIZE,
            Some(Duration::from_secs(5)),
        );

        let exit = adapter
            .adapt(StreamFrame::new(b"hello encoder".to_vec()))
            .unwrap();

        assert_eq!(exit, Some(ProcessExit { code: Some(0) }));
        assert_eq!(std::fs::read(&path).unwrap(), b"hello encoder");
    }

    #[test]
    fn test_decoder_output_reaches_emitter() {
        let launcher = OsProcessLauncher::new(
            CommandTemplate::new("sh", ["-c", "exit 1"]),
            CommandTemplate::new("sh", ["-c", "printf abc; sleep 0.3"]),
        );
        let supervisor = supervisor(launcher);
        let adapter = StreamAdapter::new(
            supervisor.clone(),
            Arc::new(RecordingMetrics::default()),
            FramingPolicy::PassThrough,
            DEFAULT_READ_BUFFER_SIZE,
            None,
        );
        let running = AtomicBool::new(true);

        let mut session = supervisor.connect_decoder(&running).unwrap();
        let mut received = Vec::new();
        let summary = adapter
            .run(&mut session, &running, |frame| {
                received.extend_from_slice(frame.as_bytes())
            })
            .unwrap();

        assert_eq!(received, b"abc");
        assert_eq!(summary.exit, Some(ProcessExit { code: Some(0) }));
    }
}
