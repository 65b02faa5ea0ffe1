use std::fs;
use std::time::Duration;

use lcmbus_compress::Lz4Compressor;
use lcmbus_net::{CancelToken, Transmitter, TransmitterOptions};

use crate::cmd::SendArgs;
use crate::exit::{net_error, CliResult, SUCCESS};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

pub fn run(args: SendArgs) -> CliResult<i32> {
    let mut options = TransmitterOptions::new()
        .with_address(args.address)
        .with_ttl(args.ttl);
    if let Some(interface) = &args.interface {
        options = options.with_interface(interface);
    }
    if args.lz4 {
        options = options.with_compression(&args.channel, Box::new(Lz4Compressor::new()));
    }

    let mut transmitter =
        Transmitter::dial(options).map_err(|err| net_error("dial failed", err))?;

    let payload = resolve_payload(&args)?;
    let token = CancelToken::with_timeout(SEND_TIMEOUT);
    transmitter
        .transmit(&token, &args.channel, &payload)
        .map_err(|err| net_error("transmit failed", err))?;
    transmitter
        .close()
        .map_err(|err| net_error("close failed", err))?;

    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}
