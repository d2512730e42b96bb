use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("rpcprims {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: rpcprims");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("RPCPRIMS_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("RPCPRIMS_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!(
        "features: client={}, loopback={}, cli=true",
        cfg!(feature = "client"),
        cfg!(feature = "loopback")
    );

    Ok(SUCCESS)
}
