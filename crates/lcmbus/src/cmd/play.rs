use std::fs::File;
use std::io::Write;

use lcmbus_log::{LogError, Player};
use lcmbus_net::{CancelToken, NetError, Transmitter, TransmitterOptions};
use tracing::info;

use crate::cmd::{parse_duration, PlayArgs};
use crate::exit::{log_error, net_error, CliError, CliResult, SUCCESS};

pub fn run(args: PlayArgs) -> CliResult<i32> {
    let max_gap = parse_duration(&args.max_gap)?;
    let file = File::open(&args.file).map_err(|err| {
        crate::exit::io_error(&format!("failed opening {}", args.file.display()), err)
    })?;

    let mut options = TransmitterOptions::new()
        .with_address(args.address)
        .with_ttl(args.ttl);
    if let Some(interface) = &args.interface {
        options = options.with_interface(interface);
    }
    let transmitter = Transmitter::dial(options).map_err(|err| net_error("dial failed", err))?;

    let mut player = Player::new(file, max_gap, args.speed, transmitter);
    let (length, total) = player
        .get_length()
        .map_err(|err| log_error("scan failed", err))?;
    info!(length = ?length, events = total, "log scanned");

    let token = CancelToken::new();
    install_ctrlc_handler(token.clone())?;

    let played = player.play(&token, |n| {
        print!("\r{:35}", "");
        print!("\rplayed {n} / {total} events");
        let _ = std::io::stdout().flush();
    });
    match played {
        Ok(skipped) => {
            println!("\nfinished, skipped {skipped} events");
            Ok(SUCCESS)
        }
        Err(LogError::Net(NetError::Cancelled)) => {
            println!("\ninterrupted");
            Ok(SUCCESS)
        }
        Err(err) => Err(log_error("play failed", err)),
    }
}

fn install_ctrlc_handler(token: CancelToken) -> CliResult<()> {
    ctrlc::set_handler(move || token.cancel()).map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
