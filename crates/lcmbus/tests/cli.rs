#![cfg(unix)]

use std::net::{Ipv4Addr, UdpSocket};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use lcmbus_wire::{LogEvent, ShortMessage};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/lcmbus-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn write_log(path: &PathBuf, count: u64, gap_us: u64) {
    let mut buf = BytesMut::new();
    for i in 0..count {
        LogEvent {
            event_number: i,
            timestamp_us: 1_000_000 + i * gap_us,
            channel: "replay".to_string(),
            params: String::new(),
            data: Bytes::from(format!("event-{i}").into_bytes()),
        }
        .encode(&mut buf);
    }
    std::fs::write(path, &buf).expect("log file should be writable");
}

fn has_multicast_interface() -> bool {
    lcmbus_net::iface::interfaces()
        .map(|all| {
            all.iter()
                .any(|i| i.is_up() && i.is_multicast() && i.addr.is_some())
        })
        .unwrap_or(false)
}

#[test]
fn version_prints_crate_version() {
    let out = Command::new(env!("CARGO_BIN_EXE_lcmbus"))
        .arg("version")
        .output()
        .expect("version command should run");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn split_writes_numbered_chunks() {
    let dir = unique_temp_dir("split");
    let log_path = dir.join("events.log");
    write_log(&log_path, 5, 1_000);

    let out = Command::new(env!("CARGO_BIN_EXE_lcmbus"))
        .args(["--log-level", "error", "split", "--split-size", "1000"])
        .arg(&log_path)
        .output()
        .expect("split command should run");
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(String::from_utf8_lossy(&out.stdout).contains("wrote 1 files"));

    let original = std::fs::read(&log_path).unwrap();
    let chunk = std::fs::read(format!("{}.0", log_path.display())).unwrap();
    assert_eq!(chunk, original);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn play_replays_all_but_the_final_event() {
    if !has_multicast_interface() {
        eprintln!("skipping: no multicast-capable interface");
        return;
    }

    let dir = unique_temp_dir("play");
    let log_path = dir.join("events.log");
    write_log(&log_path, 4, 1_000);

    let listener = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind listener");
    listener
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("set timeout");
    let port = listener.local_addr().unwrap().port();

    let address = format!("127.0.0.1:{port}");
    let out = Command::new(env!("CARGO_BIN_EXE_lcmbus"))
        .args([
            "--log-level",
            "error",
            "play",
            "--address",
            address.as_str(),
            "--speed",
            "1000",
            "--max-gap",
            "1h",
        ])
        .arg(&log_path)
        .output()
        .expect("play command should run");
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(String::from_utf8_lossy(&out.stdout).contains("skipped 0 events"));

    let mut buf = [0u8; 65_535];
    for i in 0..3 {
        let n = listener.recv(&mut buf).expect("replayed datagram");
        let message = ShortMessage::decode(&buf[..n]).expect("decode replayed datagram");
        assert_eq!(message.channel, "replay");
        assert_eq!(message.data.as_ref(), format!("event-{i}").as_bytes());
        assert_eq!(message.sequence_number, i as u32);
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn bad_duration_is_a_usage_error() {
    let out = Command::new(env!("CARGO_BIN_EXE_lcmbus"))
        .args(["play", "--max-gap", "soon", "/nonexistent.log"])
        .output()
        .expect("play command should run");
    assert_eq!(out.status.code(), Some(64));
}
