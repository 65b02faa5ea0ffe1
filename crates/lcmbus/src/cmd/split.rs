use std::fs::File;
use std::io::BufReader;

use lcmbus_log::{split_log, LogScanner};

use crate::cmd::SplitArgs;
use crate::exit::{log_error, CliResult, SUCCESS};

pub fn run(args: SplitArgs) -> CliResult<i32> {
    let file = File::open(&args.file).map_err(|err| {
        crate::exit::io_error(&format!("failed opening {}", args.file.display()), err)
    })?;
    let mut scanner = LogScanner::new(BufReader::new(file));
    let files = split_log(&mut scanner, &args.file, args.split_size)
        .map_err(|err| log_error("split failed", err))?;
    println!("wrote {files} files");
    Ok(SUCCESS)
}
