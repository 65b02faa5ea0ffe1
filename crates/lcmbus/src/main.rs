mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "lcmbus", version, about = "LCM multicast bus CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "lcmbus",
            "send",
            "--channel",
            "telemetry.pose",
            "--data",
            "hello",
        ])
        .expect("send args should parse");

        assert!(matches!(cli.command, Command::Send(_)));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "lcmbus",
            "send",
            "--channel",
            "c",
            "--data",
            "hello",
            "--file",
            "/tmp/payload.bin",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_play_subcommand() {
        let cli = Cli::try_parse_from([
            "lcmbus",
            "play",
            "--address",
            "127.0.0.1:7667",
            "--speed",
            "2.5",
            "--max-gap",
            "10s",
            "/tmp/events.log",
        ])
        .expect("play args should parse");

        let Command::Play(args) = cli.command else {
            panic!("expected play command");
        };
        assert_eq!(args.speed, 2.5);
        assert_eq!(args.max_gap, "10s");
    }

    #[test]
    fn parses_listen_with_groups_and_channels() {
        let cli = Cli::try_parse_from([
            "lcmbus",
            "listen",
            "--group",
            "239.0.0.1",
            "--group",
            "239.0.0.2",
            "--channels",
            "foo,barbaz",
            "--count",
            "3",
        ])
        .expect("listen args should parse");

        let Command::Listen(args) = cli.command else {
            panic!("expected listen command");
        };
        assert_eq!(args.groups.len(), 2);
        assert_eq!(args.channels.as_deref(), Some(&["foo".to_string(), "barbaz".to_string()][..]));
        assert_eq!(args.count, Some(3));
    }
}
