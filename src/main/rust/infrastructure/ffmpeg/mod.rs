mod command_builder;
mod os_launcher;

pub use command_builder::{CommandSpec, CommandTemplate, FfmpegCommandBuilder, URL_PLACEHOLDER};
pub use os_launcher::{OsChildProcess, OsProcessLauncher};
