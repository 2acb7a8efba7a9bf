use std::io::{self, Read, Write};

use crate::domain::value_objects::Direction;

/// Exit outcome of an external process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was ended by a signal
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A running external encoder/decoder process
pub trait ChildProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Hand out the input pipe; `None` once taken or when not piped
    fn take_stdin(&mut self) -> Option<Box<dyn Write + Send>>;

    /// Hand out the output pipe; `None` once taken or when not piped
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Non-blocking exit check
    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>>;

    /// Ask the process to stop (SIGTERM on unix)
    fn terminate(&mut self) -> io::Result<()>;

    /// Force the process to stop
    fn kill(&mut self) -> io::Result<()>;
}

/// Port for starting the external media program
pub trait ProcessLauncher: Send + Sync {
    /// Spawn the program configured for `direction` against `stream_url`.
    ///
    /// Ingest processes read their payload from stdin and push to the URL;
    /// egress processes pull from the URL and write raw bytes to stdout.
    fn launch(&self, direction: Direction, stream_url: &str) -> io::Result<Box<dyn ChildProcess>>;
}
