/// Placeholder replaced with the stream URL when a template is rendered
pub const URL_PLACEHOLDER: &str = "{url}";

/// Fully rendered command line for one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Shell-like rendering for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Program plus argument list with a `{url}` placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

impl CommandTemplate {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn render(&self, stream_url: &str) -> CommandSpec {
        CommandSpec {
            program: self.program.clone(),
            args: self
                .args
                .iter()
                .map(|arg| arg.replace(URL_PLACEHOLDER, stream_url))
                .collect(),
        }
    }
}

pub struct FfmpegCommandBuilder;

impl FfmpegCommandBuilder {
    /// Encoder: payload on stdin, re-muxed as FLV in real time and pushed to the RTMP sink
    pub fn encoder_template(ffmpeg: &str) -> CommandTemplate {
        CommandTemplate::new(
            ffmpeg,
            [
                "-hide_banner",
                "-loglevel",
                "error",
                "-re",
                "-i",
                "-",
                "-f",
                "flv",
                URL_PLACEHOLDER,
            ],
        )
    }

    /// Decoder: pull from the RTMP source, raw yuv420p pictures on stdout
    pub fn decoder_template(ffmpeg: &str) -> CommandTemplate {
        CommandTemplate::new(
            ffmpeg,
            [
                "-hide_banner",
                "-loglevel",
                "error",
                "-nostdin",
                "-i",
                URL_PLACEHOLDER,
                "-f",
                "rawvideo",
                "-pix_fmt",
                "yuv420p",
                "-",
            ],
        )
    }
}
