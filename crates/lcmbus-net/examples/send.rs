//! Transmit one message per second on a demo channel:
//!
//! ```sh
//! cargo run --example send
//! ```

use std::time::Duration;

use lcmbus_net::{CancelToken, Transmitter, TransmitterOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut transmitter = Transmitter::dial(TransmitterOptions::new())?;
    let token = CancelToken::new();
    for i in 0u64.. {
        let payload = format!("hello {i}");
        transmitter.transmit(&token, "demo", payload.as_bytes())?;
        println!("sent {payload:?}");
        std::thread::sleep(Duration::from_secs(1));
    }
    Ok(())
}
