use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};

/// Short-message header: magic (4) + sequence number (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "LC02" (0x4C 0x43 0x30 0x32), big-endian.
pub const SHORT_MESSAGE_MAGIC: u32 = 0x4C43_3032;

/// Longest allowed channel name, including `?params`. 64 with the NUL.
pub const MAX_CHANNEL_LEN: usize = 63;

/// Largest channel + NUL + data that fits a single non-fragmented datagram.
pub const MAX_PAYLOAD_LEN: usize = 65_499;

/// Largest possible UDP datagram, header included.
pub const MAX_DATAGRAM_LEN: usize = 0xFFFF;

/// Smallest decodable datagram: header plus the channel's NUL terminator.
pub const MIN_DATAGRAM_LEN: usize = HEADER_SIZE + 1;

/// A non-fragmented LCM datagram.
///
/// Wire format (all integers big-endian):
/// ```text
/// ┌──────────────┬──────────────┬───────────────────────┬─────────┐
/// │ Magic (4B)   │ Sequence(4B) │ channel[?params] NUL  │ Data    │
/// │ "LC02"       │              │ (≤ 63 bytes + NUL)    │         │
/// └──────────────┴──────────────┴───────────────────────┴─────────┘
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortMessage {
    /// The channel this message is published on.
    pub channel: String,
    /// A single `key=value` fragment carried after `?` on the wire.
    /// Conventionally `z=<compressor>`. Empty when absent.
    pub params: String,
    /// Monotonic per-transmitter counter, for gap detection.
    pub sequence_number: u32,
    /// The message payload.
    pub data: Bytes,
}

impl ShortMessage {
    /// Length of the channel as it appears on the wire (`channel` or
    /// `channel?params`), excluding the NUL terminator.
    pub fn raw_channel_len(&self) -> usize {
        if self.params.is_empty() {
            self.channel.len()
        } else {
            self.channel.len() + 1 + self.params.len()
        }
    }

    /// The total wire size of this message.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.raw_channel_len() + 1 + self.data.len()
    }

    /// Encode into `dst`, returning the number of bytes written.
    ///
    /// The channel must not itself contain `?` or NUL; the codec does not
    /// police the channel charset, but such a channel will not round-trip.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<usize> {
        encode_message(
            &self.channel,
            &self.params,
            self.sequence_number,
            &self.data,
            dst,
        )
    }

    /// Decode a datagram.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < MIN_DATAGRAM_LEN {
            return Err(WireError::TooShort { len: src.len() });
        }
        let magic = u32::from_be_bytes(src[0..4].try_into().unwrap());
        if magic != SHORT_MESSAGE_MAGIC {
            return Err(WireError::BadMagic { found: magic });
        }
        let sequence_number = u32::from_be_bytes(src[4..8].try_into().unwrap());
        let nul = src[HEADER_SIZE..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(WireError::UnterminatedChannel)?;
        let raw_channel = &src[HEADER_SIZE..HEADER_SIZE + nul];
        let (channel, params) = split_raw_channel(raw_channel);
        let data = Bytes::copy_from_slice(&src[HEADER_SIZE + nul + 1..]);
        Ok(Self {
            channel,
            params,
            sequence_number,
            data,
        })
    }
}

/// Encode a short message from its parts, returning the bytes written.
///
/// This is the allocation-free path used by the transmit hot loop; the
/// payload is borrowed rather than owned.
pub fn encode_message(
    channel: &str,
    params: &str,
    sequence_number: u32,
    data: &[u8],
    dst: &mut BytesMut,
) -> Result<usize> {
    let raw_len = if params.is_empty() {
        channel.len()
    } else {
        channel.len() + 1 + params.len()
    };
    if raw_len > MAX_CHANNEL_LEN {
        return Err(WireError::ChannelTooLong { len: raw_len });
    }
    let payload_len = raw_len + 1 + data.len();
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(WireError::PayloadTooLarge {
            size: payload_len,
            max: MAX_PAYLOAD_LEN,
        });
    }
    dst.reserve(HEADER_SIZE + payload_len);
    dst.put_u32(SHORT_MESSAGE_MAGIC);
    dst.put_u32(sequence_number);
    dst.put_slice(channel.as_bytes());
    if !params.is_empty() {
        dst.put_u8(b'?');
        dst.put_slice(params.as_bytes());
    }
    dst.put_u8(0);
    dst.put_slice(data);
    Ok(HEADER_SIZE + payload_len)
}

/// Split a wire channel on the first `?` into `(channel, params)`.
pub(crate) fn split_raw_channel(raw: &[u8]) -> (String, String) {
    match raw.iter().position(|&b| b == b'?') {
        Some(i) => (
            String::from_utf8_lossy(&raw[..i]).into_owned(),
            String::from_utf8_lossy(&raw[i + 1..]).into_owned(),
        ),
        None => (String::from_utf8_lossy(raw).into_owned(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_to_vec(m: &ShortMessage) -> Vec<u8> {
        let mut dst = BytesMut::new();
        let n = m.encode(&mut dst).unwrap();
        assert_eq!(n, dst.len());
        assert_eq!(n, m.encoded_len());
        dst.to_vec()
    }

    #[test]
    fn encode_minimal_message() {
        let m = ShortMessage {
            channel: "a".to_string(),
            params: String::new(),
            sequence_number: 0x1234_5678,
            data: Bytes::new(),
        };
        assert_eq!(
            encode_to_vec(&m),
            vec![0x4C, 0x43, 0x30, 0x32, 0x12, 0x34, 0x56, 0x78, 0x61, 0x00],
        );
    }

    #[test]
    fn encode_with_data() {
        let m = ShortMessage {
            channel: "abc".to_string(),
            params: String::new(),
            sequence_number: 0x1234_5678,
            data: Bytes::from_static(&[0x01, 0x02, 0x03]),
        };
        assert_eq!(
            encode_to_vec(&m),
            vec![
                0x4C, 0x43, 0x30, 0x32, 0x12, 0x34, 0x56, 0x78, 0x61, 0x62, 0x63, 0x00, 0x01,
                0x02, 0x03,
            ],
        );
    }

    #[test]
    fn encode_with_params() {
        let m = ShortMessage {
            channel: "abc".to_string(),
            params: "z=lz4".to_string(),
            sequence_number: 0x1234_5678,
            data: Bytes::from_static(&[0x01, 0x02, 0x03]),
        };
        assert_eq!(
            encode_to_vec(&m),
            vec![
                0x4C, 0x43, 0x30, 0x32, 0x12, 0x34, 0x56, 0x78, 0x61, 0x62, 0x63, 0x3F, 0x7A,
                0x3D, 0x6C, 0x7A, 0x34, 0x00, 0x01, 0x02, 0x03,
            ],
        );
    }

    #[test]
    fn roundtrip() {
        let m = ShortMessage {
            channel: "telemetry.pose".to_string(),
            params: "z=lz4".to_string(),
            sequence_number: 42,
            data: Bytes::from_static(b"payload bytes"),
        };
        let wire = encode_to_vec(&m);
        assert_eq!(ShortMessage::decode(&wire).unwrap(), m);
    }

    #[test]
    fn channel_at_limit_roundtrips() {
        let m = ShortMessage {
            channel: "c".repeat(MAX_CHANNEL_LEN),
            params: String::new(),
            sequence_number: 1,
            data: Bytes::from_static(&[0xAB]),
        };
        let wire = encode_to_vec(&m);
        assert_eq!(ShortMessage::decode(&wire).unwrap(), m);
    }

    #[test]
    fn channel_with_params_over_limit_rejected() {
        let m = ShortMessage {
            channel: "c".repeat(MAX_CHANNEL_LEN),
            params: "z=lz4".to_string(),
            sequence_number: 1,
            data: Bytes::new(),
        };
        let err = m.encode(&mut BytesMut::new()).unwrap_err();
        assert!(matches!(err, WireError::ChannelTooLong { len: 69 }));
    }

    #[test]
    fn payload_at_limit_accepted() {
        // channel "a" + NUL + data must total exactly MAX_PAYLOAD_LEN.
        let m = ShortMessage {
            channel: "a".to_string(),
            params: String::new(),
            sequence_number: 0,
            data: Bytes::from(vec![0u8; MAX_PAYLOAD_LEN - 2]),
        };
        let wire = encode_to_vec(&m);
        assert_eq!(wire.len(), HEADER_SIZE + MAX_PAYLOAD_LEN);
        assert_eq!(ShortMessage::decode(&wire).unwrap().data.len(), m.data.len());
    }

    #[test]
    fn payload_over_limit_rejected() {
        let m = ShortMessage {
            channel: "a".to_string(),
            params: String::new(),
            sequence_number: 0,
            data: Bytes::from(vec![0u8; MAX_PAYLOAD_LEN - 1]),
        };
        let err = m.encode(&mut BytesMut::new()).unwrap_err();
        assert!(matches!(
            err,
            WireError::PayloadTooLarge {
                size,
                max: MAX_PAYLOAD_LEN,
            } if size == MAX_PAYLOAD_LEN + 1
        ));
    }

    #[test]
    fn decode_too_short() {
        let err = ShortMessage::decode(&[0x4C, 0x43, 0x30, 0x32, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, WireError::TooShort { len: 8 }));
    }

    #[test]
    fn decode_bad_magic() {
        let err =
            ShortMessage::decode(&[0x4C, 0x43, 0x30, 0x33, 0, 0, 0, 0, b'a', 0]).unwrap_err();
        assert!(matches!(err, WireError::BadMagic { found: 0x4C43_3033 }));
    }

    #[test]
    fn decode_unterminated_channel() {
        let err =
            ShortMessage::decode(&[0x4C, 0x43, 0x30, 0x32, 0, 0, 0, 0, b'a', b'b']).unwrap_err();
        assert!(matches!(err, WireError::UnterminatedChannel));
    }

    #[test]
    fn decode_splits_params_on_first_question_mark() {
        let wire = [
            0x4C, 0x43, 0x30, 0x32, 0, 0, 0, 9, b'c', b'h', b'?', b'k', b'=', b'v', 0, 0xFF,
        ];
        let m = ShortMessage::decode(&wire).unwrap();
        assert_eq!(m.channel, "ch");
        assert_eq!(m.params, "k=v");
        assert_eq!(m.sequence_number, 9);
        assert_eq!(m.data.as_ref(), &[0xFF]);
    }
}
