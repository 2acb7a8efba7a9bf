use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{ProcessSession, ProcessSupervisor};
use crate::domain::entities::FrameAssembler;
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{MetricsReporter, ProcessExit};
use crate::domain::value_objects::{Direction, FramingPolicy, StreamFrame};

/// Default pipe read size for the egress loop
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Outcome of one egress streaming run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EgressSummary {
    pub frames: u64,
    pub bytes: u64,
    pub cancelled: bool,
    pub exit: Option<ProcessExit>,
}

/// Moves payloads across the process boundary in either direction
pub struct StreamAdapter {
    supervisor: Arc<ProcessSupervisor>,
    metrics: Arc<dyn MetricsReporter>,
    framing: FramingPolicy,
    read_buffer_size: usize,
    encoder_timeout: Option<Duration>,
}

impl StreamAdapter {
    pub fn new(
        supervisor: Arc<ProcessSupervisor>,
        metrics: Arc<dyn MetricsReporter>,
        framing: FramingPolicy,
        read_buffer_size: usize,
        encoder_timeout: Option<Duration>,
    ) -> Self {
        Self {
            supervisor,
            metrics,
            framing,
            read_buffer_size: read_buffer_size.max(1),
            encoder_timeout,
        }
    }

    /// Encode one payload: fresh encoder, full write, close input, wait for exit.
    pub fn adapt(&self, frame: StreamFrame) -> Result<Option<ProcessExit>> {
        let mut session = self.supervisor.start_encoder()?;
        session.mark_streaming();

        tracing::debug!(
            session_id = %session.id(),
            direction = %Direction::Ingest,
            stage = "write",
            "Writing {} byte payload to encoder",
            frame.len()
        );

        if let Err(e) = Self::write_payload(&mut session, frame.as_bytes()) {
            session.terminate();
            return Err(DomainError::StreamWriteFailed(e.to_string()));
        }
        self.metrics.report_frame_ingested(frame.len());

        let exit = session.wait_for_exit(self.encoder_timeout);
        match exit {
            Some(status) if status.success() => {
                tracing::debug!(session_id = %session.id(), "Encoder finished");
            }
            Some(status) => {
                tracing::warn!(
                    session_id = %session.id(),
                    direction = %Direction::Ingest,
                    stage = "encode",
                    "Encoder exited with code {:?}",
                    status.code
                );
            }
            None => {
                tracing::warn!(
                    session_id = %session.id(),
                    direction = %Direction::Ingest,
                    stage = "encode",
                    "Encoder exit status unavailable"
                );
            }
        }

        Ok(exit)
    }

    fn write_payload(session: &mut ProcessSession, payload: &[u8]) -> io::Result<()> {
        let stdin = session.stdin_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "encoder input is not piped")
        })?;
        stdin.write_all(payload)?;
        stdin.flush()?;
        session.close_stdin();
        Ok(())
    }

    /// Read decoder output until it ends or `running` drops, handing each frame to `emit`.
    ///
    /// Cancellation is observed between reads; a read already blocked returns once
    /// the process is terminated and its output pipe closes.
    pub fn run<F>(
        &self,
        session: &mut ProcessSession,
        running: &AtomicBool,
        mut emit: F,
    ) -> Result<EgressSummary>
    where
        F: FnMut(StreamFrame),
    {
        let control = session.control();
        let mut assembler = FrameAssembler::new(self.framing);
        let mut buffer = vec![0u8; self.read_buffer_size];
        let mut summary = EgressSummary::default();

        session.mark_streaming();

        let Some(stdout) = session.stdout_mut() else {
            control.terminate();
            return Err(DomainError::StreamReadFailed(
                "decoder output is not piped".to_string(),
            ));
        };

        loop {
            if !running.load(Ordering::SeqCst) {
                tracing::info!(
                    session_id = %control.id(),
                    "Shutdown signal received, stopping egress stream"
                );
                summary.cancelled = true;
                break;
            }

            let read = match stdout.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    control.terminate();
                    return Err(DomainError::StreamReadFailed(e.to_string()));
                }
            };

            for frame in assembler.push(&buffer[..read]) {
                summary.frames += 1;
                summary.bytes += frame.len() as u64;
                self.metrics.report_frame_emitted(frame.len());
                emit(frame);
            }

            if let Some(uptime) = control.uptime() {
                self.metrics.report_uptime(uptime.as_secs_f64());
            }
        }

        let partial = assembler.finish();
        if partial > 0 {
            tracing::warn!(
                session_id = %control.id(),
                "Discarding {} trailing bytes that do not fill a frame",
                partial
            );
        }

        summary.exit = if summary.cancelled {
            session.terminate()
        } else {
            control.wait_for_exit(Some(control.grace()))
        };

        tracing::info!(
            session_id = %control.id(),
            direction = %Direction::Egress,
            frames = summary.frames,
            bytes = summary.bytes,
            "Decoder output ended (exit {:?})",
            summary.exit.and_then(|exit| exit.code)
        );

        Ok(summary)
    }
}
