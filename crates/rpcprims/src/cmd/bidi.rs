use rpcprims_client::bidi_streaming_call_with_metadata;
use rpcprims_loopback::handlers::echo_stream_method;

use crate::cmd::server_stream::print_frames;
use crate::cmd::{channel, StreamArgs};
use crate::exit::CliResult;
use crate::output::OutputFormat;

pub fn run(args: StreamArgs, format: OutputFormat) -> CliResult<i32> {
    let method = args.call.method(echo_stream_method());
    let options = args.call.options()?;
    let headers = args.call.metadata();
    let requests = args.requests()?;

    let frames =
        bidi_streaming_call_with_metadata(&channel(), &method, &options, headers, requests);
    print_frames(frames, format, "bidi streaming call failed")
}
