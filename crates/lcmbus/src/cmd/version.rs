use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("lcmbus {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: lcmbus");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("LCMBUS_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "kernel_filter: {}",
        if cfg!(target_os = "linux") {
            "available"
        } else {
            "userspace-only"
        }
    );

    Ok(SUCCESS)
}
