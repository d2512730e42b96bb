use futures_util::StreamExt;
use rpcprims_client::{server_streaming_call_with_metadata, FrameStream};
use rpcprims_loopback::handlers::{repeat_method, REPEAT_HEADER};

use crate::cmd::{channel, runtime, ServerStreamArgs};
use crate::exit::{status_error, CliResult, SUCCESS};
use crate::output::{print_rows, FrameRow, OutputFormat};

pub fn run(args: ServerStreamArgs, format: OutputFormat) -> CliResult<i32> {
    let method = args.call.method(repeat_method());
    let options = args.call.options()?;
    let mut headers = args.call.metadata();
    if let Some(count) = args.count {
        headers.insert(REPEAT_HEADER, count.to_string());
    }

    let frames = server_streaming_call_with_metadata(
        &channel(),
        &method,
        &options,
        headers,
        args.data,
    );
    print_frames(frames, format, "server streaming call failed")
}

/// Drain `frames`, printing what arrived even when the stream fails.
pub(crate) fn print_frames(
    mut frames: FrameStream<String>,
    format: OutputFormat,
    context: &str,
) -> CliResult<i32> {
    let (rows, failure) = runtime()?.block_on(async move {
        let mut rows = Vec::new();
        while let Some(item) = frames.next().await {
            match item {
                Ok(frame) => rows.push(FrameRow::from_frame(&frame)),
                Err(status) => return (rows, Some(status)),
            }
        }
        (rows, None)
    });

    print_rows(&rows, format);
    match failure {
        Some(status) => Err(status_error(context, &status)),
        None => Ok(SUCCESS),
    }
}
