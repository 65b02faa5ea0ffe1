use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lcmbus_net::{CancelToken, NetError, Receiver, ReceiverOptions};

use crate::cmd::ListenArgs;
use crate::exit::{net_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

/// How often the receive loop wakes to notice Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let mut options = ReceiverOptions::new().with_port(args.port);
    if let Some(interface) = &args.interface {
        options = options.with_interface(interface);
    }
    for group in &args.groups {
        options = options.with_group(*group);
    }
    if let Some(channels) = &args.channels {
        let program = lcmbus_filter::channel_filter(channels)
            .map_err(|err| CliError::new(USAGE, format!("channel filter: {err}")))?;
        options = options.with_filter(program);
    }

    let mut receiver = Receiver::bind(options).map_err(|err| net_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let token = CancelToken::with_timeout(POLL_INTERVAL);
        match receiver.receive(&token) {
            Ok(()) => {}
            // Timed-out poll tick; check the flag and wait again.
            Err(NetError::Cancelled) => continue,
            Err(err) => return Err(net_error("receive failed", err)),
        }

        // The kernel filter already narrows the channel set on Linux;
        // this keeps the contract on platforms without one.
        if let Some(channels) = &args.channels {
            if !channels.contains(&receiver.message().channel) {
                continue;
            }
        }

        print_message(receiver.message(), receiver.source_address(), format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    receiver
        .close()
        .map_err(|err| net_error("close failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
