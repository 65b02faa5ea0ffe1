//! Print every message seen on the default group:
//!
//! ```sh
//! cargo run --example receive
//! ```

use lcmbus_net::{CancelToken, Receiver, ReceiverOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut receiver = Receiver::bind(ReceiverOptions::new())?;
    let token = CancelToken::new();
    loop {
        receiver.receive(&token)?;
        let message = receiver.message();
        println!(
            "{} #{} ({} bytes) from {:?}",
            message.channel,
            message.sequence_number,
            message.data.len(),
            receiver.source_address(),
        );
    }
}
