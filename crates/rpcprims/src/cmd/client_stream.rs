use rpcprims_client::client_streaming_call_with_metadata;
use rpcprims_loopback::handlers::concat_method;

use crate::cmd::{channel, runtime, StreamArgs};
use crate::exit::{status_error, CliResult, SUCCESS};
use crate::output::{print_rows, rows_from_context, OutputFormat};

pub fn run(args: StreamArgs, format: OutputFormat) -> CliResult<i32> {
    let method = args.call.method(concat_method());
    let options = args.call.options()?;
    let headers = args.call.metadata();
    let requests = args.requests()?;

    tracing::debug!(
        method = method.full_name(),
        count = args.data.len(),
        "streaming requests"
    );
    let context = runtime()?
        .block_on(client_streaming_call_with_metadata(
            &channel(),
            &method,
            &options,
            headers,
            requests,
        ))
        .map_err(|status| status_error("client streaming call failed", &status))?;

    print_rows(&rows_from_context(&context), format);
    Ok(SUCCESS)
}
