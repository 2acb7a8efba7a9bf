use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};

use super::{CommandTemplate, FfmpegCommandBuilder};
use crate::domain::ports::{ChildProcess, ProcessExit, ProcessLauncher};
use crate::domain::value_objects::Direction;

/// Launches the encoder/decoder as an OS process with piped stdio
pub struct OsProcessLauncher {
    encoder: CommandTemplate,
    decoder: CommandTemplate,
}

impl OsProcessLauncher {
    pub fn new(encoder: CommandTemplate, decoder: CommandTemplate) -> Self {
        Self { encoder, decoder }
    }

    /// Use the stock ffmpeg argument templates
    pub fn ffmpeg(ffmpeg_path: &str) -> Self {
        Self::new(
            FfmpegCommandBuilder::encoder_template(ffmpeg_path),
            FfmpegCommandBuilder::decoder_template(ffmpeg_path),
        )
    }

    fn template(&self, direction: Direction) -> &CommandTemplate {
        match direction {
            Direction::Ingest => &self.encoder,
            Direction::Egress => &self.decoder,
        }
    }
}

impl ProcessLauncher for OsProcessLauncher {
    fn launch(&self, direction: Direction, stream_url: &str) -> io::Result<Box<dyn ChildProcess>> {
        let spec = self.template(direction).render(stream_url);
        tracing::info!(direction = %direction, "Launching: {}", spec.command_line());

        let mut command = Command::new(&spec.program);
        command.args(&spec.args).stderr(Stdio::inherit());
        match direction {
            Direction::Ingest => {
                command.stdin(Stdio::piped()).stdout(Stdio::null());
            }
            Direction::Egress => {
                command.stdin(Stdio::null()).stdout(Stdio::piped());
            }
        }

        let child = command.spawn()?;
        Ok(Box::new(OsChildProcess { child }))
    }
}

pub struct OsChildProcess {
    child: Child,
}

impl ChildProcess for OsChildProcess {
    fn id(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn take_stdin(&mut self) -> Option<Box<dyn Write + Send>> {
        self.child
            .stdin
            .take()
            .map(|stdin| Box::new(stdin) as Box<dyn Write + Send>)
    }

    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.child
            .stdout
            .take()
            .map(|stdout| Box::new(stdout) as Box<dyn Read + Send>)
    }

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| ProcessExit { code: status.code() }))
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = Pid::from_raw(self.child.id() as i32);
        kill(pid, Signal::SIGTERM).map_err(io::Error::from)
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.child.kill()
    }

    fn kill(&mut self) -> io::Result<()> {
        match self.child.kill() {
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }
}
