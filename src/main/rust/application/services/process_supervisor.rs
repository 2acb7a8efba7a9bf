use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use uuid::Uuid;

use crate::domain::entities::SessionLifecycle;
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{ChildProcess, Clock, MetricsReporter, ProcessExit, ProcessLauncher};
use crate::domain::value_objects::{ConnectRetryPolicy, Direction, SessionState};

/// How often a waiting caller re-checks whether the process has exited
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Tuning for spawn, connect retry, and teardown
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorOptions {
    pub retry_policy: ConnectRetryPolicy,
    /// Delay between spawning a decoder and checking that it is still alive
    pub liveness_probe: Duration,
    /// Time a process gets to exit after SIGTERM before it is killed
    pub termination_grace: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            retry_policy: ConnectRetryPolicy::default(),
            liveness_probe: Duration::ZERO,
            termination_grace: Duration::from_secs(2),
        }
    }
}

struct SessionInner {
    child: Box<dyn ChildProcess>,
    lifecycle: SessionLifecycle,
}

/// Shared control over a session's process, usable from other threads.
///
/// Only teardown goes through here; pipes stay with the owning [`ProcessSession`].
#[derive(Clone)]
pub struct SessionControl {
    id: Arc<str>,
    inner: Arc<Mutex<SessionInner>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsReporter>,
    grace: Duration,
}

impl SessionControl {
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        *self.lock().lifecycle.current_state()
    }

    pub fn exit(&self) -> Option<ProcessExit> {
        self.lock().lifecycle.exit()
    }

    pub fn uptime(&self) -> Option<Duration> {
        self.lock().lifecycle.uptime()
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub fn mark_streaming(&self) {
        let mut inner = self.lock();
        if inner.lifecycle.current_state().is_terminal() {
            return;
        }
        inner.lifecycle.transition_to_streaming();
        self.metrics.report_state_change(inner.lifecycle.current_state());
    }

    /// Liveness check; records the exit when the process is found gone
    pub fn is_alive(&self) -> bool {
        let mut inner = self.lock();
        if inner.lifecycle.current_state().is_terminal() {
            return false;
        }
        match inner.child.try_wait() {
            Ok(None) => true,
            Ok(Some(exit)) => {
                self.record_stopped(&mut inner, Some(exit), "process exited");
                false
            }
            Err(e) => {
                tracing::warn!(session_id = %self.id, "Failed to poll process: {}", e);
                self.record_stopped(&mut inner, None, "process poll failed");
                false
            }
        }
    }

    /// Wait for the process to exit on its own, terminating it once `timeout` runs out
    pub fn wait_for_exit(&self, timeout: Option<Duration>) -> Option<ProcessExit> {
        let deadline = timeout.map(|t| self.clock.now() + t);

        loop {
            {
                let mut inner = self.lock();
                if inner.lifecycle.current_state().is_terminal() {
                    return inner.lifecycle.exit();
                }
                match inner.child.try_wait() {
                    Ok(Some(exit)) => {
                        self.record_stopped(&mut inner, Some(exit), "process exited");
                        return Some(exit);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(session_id = %self.id, "Failed to wait for process: {}", e);
                        self.record_stopped(&mut inner, None, "process wait failed");
                        return None;
                    }
                }
            }

            if deadline.is_some_and(|deadline| self.clock.now() >= deadline) {
                tracing::warn!(
                    session_id = %self.id,
                    "Process did not exit within {:?}, terminating",
                    timeout.unwrap_or_default()
                );
                return self.terminate();
            }

            self.clock.sleep(EXIT_POLL_INTERVAL);
        }
    }

    /// Stop the process: SIGTERM, bounded grace period, then kill.
    ///
    /// Idempotent; once stopped, later calls only return the recorded exit.
    pub fn terminate(&self) -> Option<ProcessExit> {
        let mut inner = self.lock();
        if inner.lifecycle.current_state().is_terminal() {
            return inner.lifecycle.exit();
        }

        tracing::info!(session_id = %self.id, "Terminating process");

        if let Err(e) = inner.child.terminate() {
            tracing::debug!(session_id = %self.id, "Terminate signal failed: {}", e);
        }

        let deadline = self.clock.now() + self.grace;
        let mut exit = None;
        loop {
            match inner.child.try_wait() {
                Ok(Some(status)) => {
                    exit = Some(status);
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(session_id = %self.id, "Failed to poll process: {}", e);
                    break;
                }
            }
            if self.clock.now() >= deadline {
                break;
            }
            self.clock.sleep(EXIT_POLL_INTERVAL);
        }

        if exit.is_none() {
            tracing::warn!(
                session_id = %self.id,
                "Process ignored terminate for {:?}, killing",
                self.grace
            );
            if let Err(e) = inner.child.kill() {
                tracing::warn!(session_id = %self.id, "Failed to kill process: {}", e);
            }
            exit = inner.child.try_wait().ok().flatten();
        }

        self.record_stopped(&mut inner, exit, "terminated");
        exit
    }

    fn record_stopped(&self, inner: &mut SessionInner, exit: Option<ProcessExit>, reason: &str) {
        inner
            .lifecycle
            .transition_to_stopped(exit, Some(reason.to_string()));
        self.metrics.report_state_change(inner.lifecycle.current_state());
        if let Some(uptime) = inner.lifecycle.uptime() {
            self.metrics.report_uptime(uptime.as_secs_f64());
        }
        tracing::debug!(session_id = %self.id, exit = ?exit, "Session stopped ({})", reason);
    }
}

/// One running encoder or decoder process and its pipes
pub struct ProcessSession {
    direction: Direction,
    stdin: Option<Box<dyn Write + Send>>,
    stdout: Option<Box<dyn Read + Send>>,
    control: SessionControl,
}

impl ProcessSession {
    pub fn id(&self) -> &str {
        self.control.id()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    pub fn state(&self) -> SessionState {
        self.control.state()
    }

    pub fn exit(&self) -> Option<ProcessExit> {
        self.control.exit()
    }

    pub fn is_alive(&self) -> bool {
        self.control.is_alive()
    }

    pub fn mark_streaming(&self) {
        self.control.mark_streaming();
    }

    pub fn stdin_mut(&mut self) -> Option<&mut (dyn Write + Send + 'static)> {
        self.stdin.as_deref_mut()
    }

    pub fn stdout_mut(&mut self) -> Option<&mut (dyn Read + Send + 'static)> {
        self.stdout.as_deref_mut()
    }

    /// Close the input pipe so the process sees end of input
    pub fn close_stdin(&mut self) {
        self.stdin.take();
    }

    pub fn wait_for_exit(&mut self, timeout: Option<Duration>) -> Option<ProcessExit> {
        self.close_stdin();
        self.control.wait_for_exit(timeout)
    }

    /// Force-close both pipes and stop the process; idempotent
    pub fn terminate(&mut self) -> Option<ProcessExit> {
        self.stdin.take();
        self.stdout.take();
        self.control.terminate()
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        if !self.control.state().is_terminal() {
            self.terminate();
        }
    }
}

/// Owns the lifecycle of the external process for one bridge
pub struct ProcessSupervisor {
    stream_url: String,
    launcher: Arc<dyn ProcessLauncher>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsReporter>,
    options: SupervisorOptions,
    active: Mutex<Option<SessionControl>>,
}

impl ProcessSupervisor {
    pub fn new(
        stream_url: String,
        launcher: Arc<dyn ProcessLauncher>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsReporter>,
        options: SupervisorOptions,
    ) -> Self {
        Self {
            stream_url,
            launcher,
            clock,
            metrics,
            options,
            active: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    /// Spawn one encoder for a single payload. No retry: spawn failures surface immediately.
    pub fn start_encoder(&self) -> Result<ProcessSession> {
        let mut lifecycle = SessionLifecycle::new();
        lifecycle.transition_to_starting();
        self.metrics.report_state_change(lifecycle.current_state());

        match self.spawn_live(Direction::Ingest, Duration::ZERO) {
            Ok(child) => Ok(self.open_session(Direction::Ingest, child, lifecycle)),
            Err(reason) => {
                lifecycle.transition_to_failed(Some(reason.clone()));
                self.metrics.report_state_change(lifecycle.current_state());
                Err(DomainError::ProcessSpawnFailed(reason))
            }
        }
    }

    /// Spawn the decoder, retrying at a fixed interval until the connect budget is spent.
    ///
    /// `running` is checked before every attempt so shutdown cuts the loop short.
    pub fn connect_decoder(&self, running: &AtomicBool) -> Result<ProcessSession> {
        let policy = &self.options.retry_policy;
        let mut lifecycle = SessionLifecycle::new();
        let first_attempt = self.clock.now();
        let mut attempt = 0u32;

        tracing::info!(
            direction = %Direction::Egress,
            stage = "connect",
            "Connecting to stream source {} (budget {:?})",
            self.stream_url,
            policy.budget()
        );

        loop {
            if !running.load(Ordering::SeqCst) {
                lifecycle.transition_to_failed(Some("cancelled".to_string()));
                return Err(DomainError::BridgeNotRunning);
            }

            attempt += 1;
            lifecycle.transition_to_starting();
            self.metrics.report_state_change(lifecycle.current_state());
            self.metrics.report_connect_attempt();

            let reason = match self.spawn_live(Direction::Egress, self.options.liveness_probe) {
                Ok(child) => {
                    tracing::info!(
                        direction = %Direction::Egress,
                        stage = "connect",
                        "Connected to stream source on attempt {}",
                        attempt
                    );
                    return Ok(self.open_session(Direction::Egress, child, lifecycle));
                }
                Err(reason) => reason,
            };

            tracing::warn!(
                direction = %Direction::Egress,
                stage = "connect",
                "Connection attempt {} failed: {}. Retrying in {:?}...",
                attempt,
                reason,
                policy.interval()
            );
            lifecycle.transition_to_retrying(attempt, Some(reason));
            self.metrics.report_state_change(lifecycle.current_state());

            self.clock.sleep(policy.interval());

            let elapsed = self.clock.now().saturating_duration_since(first_attempt);
            if !policy.allows_attempt(elapsed) {
                tracing::error!(
                    direction = %Direction::Egress,
                    stage = "connect",
                    "Giving up on stream source after {} attempts in {:?}",
                    attempt,
                    elapsed
                );
                lifecycle.transition_to_failed(Some("connect budget exhausted".to_string()));
                self.metrics.report_state_change(lifecycle.current_state());
                return Err(DomainError::ConnectionTimeout {
                    budget: policy.budget(),
                    attempts: attempt,
                });
            }
        }
    }

    /// Stop whichever session is currently active; safe when there is none
    pub fn terminate_active(&self) {
        let active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(control) = active {
            control.terminate();
        }
    }

    /// Launch and check the process is still up after `probe`
    fn spawn_live(
        &self,
        direction: Direction,
        probe: Duration,
    ) -> std::result::Result<Box<dyn ChildProcess>, String> {
        let mut child = self
            .launcher
            .launch(direction, &self.stream_url)
            .map_err(|e| format!("failed to launch {} process: {}", direction, e))?;
        self.metrics.report_process_spawned();

        if !probe.is_zero() {
            self.clock.sleep(probe);
        }

        match child.try_wait() {
            Ok(None) => Ok(child),
            Ok(Some(exit)) => Err(format!(
                "{} process exited immediately (code {:?})",
                direction, exit.code
            )),
            Err(e) => {
                let _ = child.kill();
                Err(format!("failed to poll {} process: {}", direction, e))
            }
        }
    }

    fn open_session(
        &self,
        direction: Direction,
        mut child: Box<dyn ChildProcess>,
        mut lifecycle: SessionLifecycle,
    ) -> ProcessSession {
        lifecycle.transition_to_connected();
        self.metrics.report_state_change(lifecycle.current_state());

        let stdin = child.take_stdin();
        let stdout = child.take_stdout();
        let id: Arc<str> = Arc::from(Uuid::new_v4().to_string());

        tracing::debug!(
            session_id = %id,
            direction = %direction,
            pid = ?child.id(),
            "Process session opened"
        );

        let control = SessionControl {
            id,
            inner: Arc::new(Mutex::new(SessionInner { child, lifecycle })),
            clock: self.clock.clone(),
            metrics: self.metrics.clone(),
            grace: self.options.termination_grace,
        };

        *self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(control.clone());

        ProcessSession {
            direction,
            stdin,
            stdout,
            control,
        }
    }
}
