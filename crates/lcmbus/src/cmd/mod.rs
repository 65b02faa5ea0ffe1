use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod play;
pub mod send;
pub mod split;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Join a multicast group and print received messages.
    Listen(ListenArgs),
    /// Transmit a single message.
    Send(SendArgs),
    /// Play a log file back onto the bus.
    Play(PlayArgs),
    /// Split a log file into size-bounded chunks.
    Split(SplitArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args),
        Command::Play(args) => play::run(args),
        Command::Split(args) => split::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Port to listen on.
    #[arg(long, short = 'p', default_value_t = lcmbus_net::DEFAULT_PORT)]
    pub port: u16,
    /// Interface to receive on.
    #[arg(long, short = 'i')]
    pub interface: Option<String>,
    /// Multicast group to join (repeatable). Default: 239.255.76.67.
    #[arg(long = "group", value_name = "IP")]
    pub groups: Vec<Ipv4Addr>,
    /// Only accept these channels (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub channels: Option<Vec<String>>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Destination address.
    #[arg(long, default_value = "239.255.76.67:7667")]
    pub address: SocketAddrV4,
    /// Interface to transmit on.
    #[arg(long, short = 'i')]
    pub interface: Option<String>,
    /// Channel to publish on.
    #[arg(long, short = 'c')]
    pub channel: String,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Compress the payload with LZ4.
    #[arg(long)]
    pub lz4: bool,
    /// Multicast TTL.
    #[arg(long, default_value_t = 1)]
    pub ttl: u32,
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Address to play the log to.
    #[arg(long, default_value = "239.255.76.67:7667")]
    pub address: SocketAddrV4,
    /// Interface to transmit on.
    #[arg(long, short = 'i')]
    pub interface: Option<String>,
    /// Skip events further apart than this (e.g. 10s, 1h).
    #[arg(long, default_value = "1h")]
    pub max_gap: String,
    /// Playback speed factor.
    #[arg(long, default_value_t = 1.0)]
    pub speed: f64,
    /// Multicast TTL.
    #[arg(long, default_value_t = 1)]
    pub ttl: u32,
    /// Log file to play.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Split size per output file, in megabytes.
    #[arg(long, default_value_t = 1000)]
    pub split_size: u32,
    /// Log file to split; chunks land next to it as `<file>.<k>`.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
    } else if let Some(num) = input.strip_suffix('h') {
        (num, "h")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }
}
