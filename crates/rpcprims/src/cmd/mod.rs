use std::time::Duration;

use clap::{Args, Subcommand};
use futures_util::stream::{self, Stream, StreamExt};
use rpcprims_call::{CallOptions, Metadata, MethodDescriptor, Status, Utf8Marshaller};
use rpcprims_loopback::{demo_router, LoopbackChannel};
use tokio::runtime::Runtime;

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod bidi;
pub mod client_stream;
pub mod server_stream;
pub mod unary;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one request to the unary echo handler.
    Unary(UnaryArgs),
    /// Send one request and print every frame of the streamed reply.
    ServerStream(ServerStreamArgs),
    /// Stream requests to the concat handler and print its single reply.
    ClientStream(StreamArgs),
    /// Stream requests to the bidi echo handler and print every reply frame.
    Bidi(StreamArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Unary(args) => unary::run(args, format),
        Command::ServerStream(args) => server_stream::run(args, format),
        Command::ClientStream(args) => client_stream::run(args, format),
        Command::Bidi(args) => bidi::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Options shared by every call command.
#[derive(Args, Debug)]
pub struct CallArgs {
    /// Full method name to call instead of the built-in demo method.
    #[arg(long, value_name = "SERVICE/METHOD")]
    pub method: Option<String>,
    /// Request header (repeatable).
    #[arg(long = "header", short = 'H', value_name = "NAME=VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
    /// Call deadline (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct UnaryArgs {
    #[command(flatten)]
    pub call: CallArgs,
    /// Request payload.
    #[arg(long, default_value = "ping")]
    pub data: String,
}

#[derive(Args, Debug)]
pub struct ServerStreamArgs {
    #[command(flatten)]
    pub call: CallArgs,
    /// Request payload.
    #[arg(long, default_value = "ping")]
    pub data: String,
    /// Number of replies to ask the handler for.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    #[command(flatten)]
    pub call: CallArgs,
    /// Request payload (repeatable, sent in order).
    #[arg(long)]
    pub data: Vec<String>,
    /// Pause before each request (e.g. 100ms).
    #[arg(long)]
    pub delay: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show build target and enabled features.
    #[arg(long)]
    pub extended: bool,
}

impl CallArgs {
    pub fn options(&self) -> CliResult<CallOptions> {
        let mut options = CallOptions::new();
        if let Some(timeout) = &self.timeout {
            options = options.with_timeout(parse_duration(timeout)?);
        }
        Ok(options)
    }

    pub fn metadata(&self) -> Metadata {
        self.headers.iter().map(|(k, v)| (k, v.clone())).collect()
    }

    /// `default` unless `--method` names another method of the same shape.
    pub fn method(
        &self,
        default: MethodDescriptor<String, String>,
    ) -> MethodDescriptor<String, String> {
        match &self.method {
            Some(name) => MethodDescriptor::new(
                name.as_str(),
                default.method_type(),
                Utf8Marshaller,
                Utf8Marshaller,
            ),
            None => default,
        }
    }
}

impl StreamArgs {
    pub fn requests(
        &self,
    ) -> CliResult<impl Stream<Item = Result<String, Status>> + Send + 'static> {
        let delay = self.delay.as_deref().map(parse_duration).transpose()?;
        Ok(stream::iter(self.data.clone()).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, Status>(item)
        }))
    }
}

pub fn channel() -> LoopbackChannel {
    LoopbackChannel::new(demo_router())
}

pub fn runtime() -> CliResult<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))
}

fn parse_header(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got {input:?}")),
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
