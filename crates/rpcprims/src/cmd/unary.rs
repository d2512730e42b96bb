use rpcprims_client::unary_call_with_metadata;
use rpcprims_loopback::handlers::echo_method;

use crate::cmd::{channel, runtime, UnaryArgs};
use crate::exit::{status_error, CliResult, SUCCESS};
use crate::output::{print_rows, rows_from_context, OutputFormat};

pub fn run(args: UnaryArgs, format: OutputFormat) -> CliResult<i32> {
    let method = args.call.method(echo_method());
    let options = args.call.options()?;
    let headers = args.call.metadata();

    let context = runtime()?
        .block_on(unary_call_with_metadata(
            &channel(),
            &method,
            &options,
            headers,
            args.data,
        ))
        .map_err(|status| status_error("unary call failed", &status))?;

    print_rows(&rows_from_context(&context), format);
    Ok(SUCCESS)
}
