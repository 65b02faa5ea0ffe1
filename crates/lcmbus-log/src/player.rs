use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use tracing::debug;

use lcmbus_net::CancelToken;
use lcmbus_wire::LogEvent;

use crate::error::Result;
use crate::scanner::LogScanner;

/// The transmit capability playback needs; implemented by
/// [`lcmbus_net::Transmitter`].
pub trait Transmit {
    fn transmit(&mut self, token: &CancelToken, channel: &str, data: &[u8])
        -> lcmbus_net::Result<()>;
}

impl Transmit for lcmbus_net::Transmitter {
    fn transmit(
        &mut self,
        token: &CancelToken,
        channel: &str,
        data: &[u8],
    ) -> lcmbus_net::Result<()> {
        lcmbus_net::Transmitter::transmit(self, token, channel, data)
    }
}

/// Paces the events of a log file onto the bus according to their
/// recorded timestamps.
pub struct Player<S, T> {
    source: S,
    max_gap: Duration,
    speed: f64,
    transmitter: T,
}

impl<S, T> Player<S, T>
where
    S: Read + Seek,
    T: Transmit,
{
    /// `max_gap` bounds the inter-event wait: a larger recorded gap skips
    /// the event instead of sleeping through it. `speed` divides every
    /// wait; a non-positive factor plays in real time.
    pub fn new(source: S, max_gap: Duration, speed: f64, transmitter: T) -> Self {
        Self {
            source,
            max_gap,
            speed: if speed > 0.0 { speed } else { 1.0 },
            transmitter,
        }
    }

    /// The log's duration (first to last timestamp) and event count.
    ///
    /// Scans the whole file and rewinds it. An empty log reports zero
    /// duration and zero events.
    pub fn get_length(&mut self) -> Result<(Duration, usize)> {
        self.rewind()?;
        let mut scanner = LogScanner::new(&mut self.source);
        if !scanner.scan() {
            if let Some(err) = scanner.take_err() {
                return Err(err);
            }
            self.rewind()?;
            return Ok((Duration::ZERO, 0));
        }
        let first_ts = scanner.event().timestamp_us;
        let mut last_ts = first_ts;
        let mut count = 1;
        while scanner.scan() {
            last_ts = scanner.event().timestamp_us;
            count += 1;
        }
        if let Some(err) = scanner.take_err() {
            return Err(err);
        }
        drop(scanner);
        self.rewind()?;
        Ok((
            Duration::from_micros(last_ts.saturating_sub(first_ts)),
            count,
        ))
    }

    /// Play the log through the transmitter, returning the number of
    /// skipped events.
    ///
    /// For each event after the first, the player waits the recorded gap
    /// to the previous event (divided by the speed factor) and then
    /// transmits the *previous* event — so the final event in the file
    /// paces playback but is never itself transmitted. A gap larger than
    /// `max_gap` is counted as skipped and consumes no wait and no
    /// transmit. `progress` is invoked with the number of events processed
    /// so far. Cancellation during a wait aborts with the cancellation
    /// error; the file is rewound on clean completion.
    pub fn play(&mut self, token: &CancelToken, mut progress: impl FnMut(usize)) -> Result<usize> {
        self.rewind()?;
        let mut scanner = LogScanner::new(&mut self.source);
        let mut previous: Option<LogEvent> = None;
        let mut processed = 0;
        let mut skipped = 0;
        while scanner.scan() {
            let current = scanner.event().clone();
            let Some(prev) = previous.take() else {
                previous = Some(current);
                continue;
            };
            let gap = Duration::from_micros(
                current.timestamp_us.saturating_sub(prev.timestamp_us),
            );
            progress(processed);
            processed += 1;
            if gap > self.max_gap {
                skipped += 1;
                previous = Some(current);
                continue;
            }
            token.sleep(gap.div_f64(self.speed))?;
            self.transmitter.transmit(token, &prev.channel, &prev.data)?;
            previous = Some(current);
        }
        if let Some(err) = scanner.take_err() {
            return Err(err);
        }
        drop(scanner);
        debug!(processed, skipped, "finished playback");
        self.rewind()?;
        Ok(skipped)
    }

    fn rewind(&mut self) -> Result<()> {
        self.source.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{Bytes, BytesMut};
    use lcmbus_net::NetError;

    use crate::error::LogError;

    use super::*;

    #[derive(Default)]
    struct Recording {
        sent: Vec<(String, Vec<u8>)>,
    }

    impl Transmit for Recording {
        fn transmit(
            &mut self,
            _token: &CancelToken,
            channel: &str,
            data: &[u8],
        ) -> lcmbus_net::Result<()> {
            self.sent.push((channel.to_string(), data.to_vec()));
            Ok(())
        }
    }

    fn log_with_gaps(gap_us: u64, count: u64) -> Cursor<Vec<u8>> {
        let mut buf = BytesMut::new();
        for i in 0..count {
            LogEvent {
                event_number: i,
                timestamp_us: 1_000_000 + i * gap_us,
                channel: format!("ch{i}"),
                params: String::new(),
                data: Bytes::from(format!("payload-{i}").into_bytes()),
            }
            .encode(&mut buf);
        }
        Cursor::new(buf.to_vec())
    }

    #[test]
    fn get_length_spans_first_to_last() {
        let mut player = Player::new(
            log_with_gaps(1_000_000, 10),
            Duration::from_secs(10),
            1.0,
            Recording::default(),
        );
        let (length, count) = player.get_length().unwrap();
        assert_eq!(length, Duration::from_secs(9));
        assert_eq!(count, 10);
        // The file is rewound: a second pass sees the same log.
        assert_eq!(player.get_length().unwrap(), (Duration::from_secs(9), 10));
    }

    #[test]
    fn get_length_of_empty_log() {
        let mut player = Player::new(
            Cursor::new(Vec::new()),
            Duration::from_secs(1),
            1.0,
            Recording::default(),
        );
        assert_eq!(player.get_length().unwrap(), (Duration::ZERO, 0));
    }

    #[test]
    fn plays_all_but_the_final_event() {
        let mut player = Player::new(
            log_with_gaps(1_000, 10),
            Duration::from_secs(10),
            1000.0,
            Recording::default(),
        );
        let mut calls = Vec::new();
        let skipped = player.play(&CancelToken::new(), |n| calls.push(n)).unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(calls, (0..9).collect::<Vec<_>>());
        let sent = &player.transmitter.sent;
        assert_eq!(sent.len(), 9);
        assert_eq!(sent[0].0, "ch0");
        assert_eq!(sent[8].0, "ch8");
        assert_eq!(sent[8].1, b"payload-8");
    }

    #[test]
    fn oversized_gaps_are_skipped_without_transmit() {
        let mut player = Player::new(
            log_with_gaps(2_000_000, 10),
            Duration::from_secs(1),
            1.0,
            Recording::default(),
        );
        let skipped = player.play(&CancelToken::new(), |_| {}).unwrap();
        assert_eq!(skipped, 9);
        assert!(player.transmitter.sent.is_empty());
    }

    #[test]
    fn cancellation_aborts_the_wait() {
        let mut player = Player::new(
            log_with_gaps(5_000_000, 3),
            Duration::from_secs(10),
            1.0,
            Recording::default(),
        );
        let token = CancelToken::with_timeout(Duration::from_millis(20));
        let err = player.play(&token, |_| {}).unwrap_err();
        assert!(matches!(err, LogError::Net(NetError::Cancelled)));
    }

    #[test]
    fn scanner_errors_abort_playback() {
        let mut log = log_with_gaps(1_000, 3).into_inner();
        log.truncate(log.len() - 2);
        let mut player = Player::new(
            Cursor::new(log),
            Duration::from_secs(10),
            1000.0,
            Recording::default(),
        );
        let err = player.play(&CancelToken::new(), |_| {}).unwrap_err();
        assert!(matches!(
            err,
            LogError::Wire(lcmbus_wire::WireError::PartialMessage { .. })
        ));
    }

    #[test]
    fn speed_factor_divides_the_wait() {
        let mut player = Player::new(
            log_with_gaps(200_000, 4),
            Duration::from_secs(10),
            100.0,
            Recording::default(),
        );
        let start = std::time::Instant::now();
        let skipped = player.play(&CancelToken::new(), |_| {}).unwrap();
        assert_eq!(skipped, 0);
        // 3 gaps of 200ms play in ~6ms at 100x.
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(player.transmitter.sent.len(), 3);
    }
}
