//! Worker bootstrap configuration, parsed from the command line the host
//! launches the worker with:
//!
//! ```text
//! worker --host 127.0.0.1 --port 50051 --workerId w1 --requestId r1 --grpcMaxMessageLength 2147483647
//! ```
//!
//! Hosts also pass the single-dash forms (`-port 50051`, `-port=50051`) and
//! flags meant for other workers, so arguments are normalized before `clap`
//! sees them: single-dash flags gain a dash and unknown flags are dropped
//! along with their value.

use std::fmt;

use clap::Parser;
use clap::error::ErrorKind;

pub const HOST: &str = "host";
pub const PORT: &str = "port";
pub const WORKER_ID: &str = "workerId";
pub const REQUEST_ID: &str = "requestId";
pub const MAX_MESSAGE_LENGTH: &str = "grpcMaxMessageLength";

const FLAGS: [&str; 5] = [HOST, PORT, WORKER_ID, REQUEST_ID, MAX_MESSAGE_LENGTH];

/// Carries the message `clap` rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Missing(String),
    Invalid(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(msg) | Self::Invalid(msg) => write!(f, "{}", msg.trim_end()),
        }
    }
}

impl std::error::Error for Error {}

impl From<clap::Error> for Error {
    fn from(e: clap::Error) -> Self {
        match e.kind() {
            ErrorKind::MissingRequiredArgument => Self::Missing(e.to_string()),
            _ => Self::Invalid(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "azrun", version, about = "Out-of-process function worker")]
pub struct WorkerConfig {
    /// Host address of the function host.
    #[arg(long = "host")]
    pub host: String,

    /// Port the function host listens on.
    #[arg(long = "port")]
    pub port: u16,

    #[arg(long = "workerId")]
    pub worker_id: String,

    /// Request id to answer the opening `StartStream` with.
    #[arg(long = "requestId")]
    pub request_id: String,

    /// Largest frame accepted or sent, in bytes.
    #[arg(long = "grpcMaxMessageLength")]
    pub max_message_length: usize,
}

impl WorkerConfig {
    /// Parses flags from `args`, which excludes the program name.
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let argv = std::iter::once("azrun".to_string()).chain(normalize(args));
        Ok(Self::try_parse_from(argv)?)
    }

    /// Reads the process arguments.
    pub fn from_env() -> Result<Self> {
        Self::from_args(std::env::args().skip(1))
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Rewrites known flags to their `--` form and drops everything else the
/// worker does not own.
fn normalize<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out = Vec::new();
    let mut args = args.into_iter().peekable();
    while let Some(arg) = args.next() {
        let Some(flag) = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-')) else {
            out.push(arg);
            continue;
        };
        let name = flag.split_once('=').map_or(flag, |(name, _)| name);
        if FLAGS.contains(&name) {
            out.push(format!("--{}", flag));
        } else if !flag.contains('=') {
            args.next_if(|next| !next.starts_with('-'));
        }
    }
    out
}
