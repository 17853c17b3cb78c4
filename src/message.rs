//! # Notification messages.
//!
//! Every datagram read from the endpoint is classified exactly once into a
//! [`Message`]; nothing downstream looks at raw bytes again.

use std::fmt;

/// Maximum payload read per datagram; longer datagrams are truncated by the read.
pub const MAX_PAYLOAD: usize = 1024;

/// The only payload with meaning to the proxy.
pub const READY_PAYLOAD: &[u8] = b"READY=1";

/// A classified notification message.
#[derive(Clone, PartialEq, Eq)]
pub enum Message {
    /// Payload was exactly `READY=1`.
    Ready,
    /// Any other payload; logged and ignored.
    Unrecognized(Vec<u8>),
    /// The endpoint failed while it was still supposed to be open.
    ReadError(String),
}

impl Message {
    /// Classifies a received payload.
    ///
    /// ```
    /// use sdnotify_proxy::Message;
    ///
    /// assert_eq!(Message::classify(b"READY=1"), Message::Ready);
    /// assert!(matches!(Message::classify(b"READY=1\n"), Message::Unrecognized(_)));
    /// ```
    pub fn classify(payload: &[u8]) -> Self {
        if payload == READY_PAYLOAD {
            Message::Ready
        } else {
            Message::Unrecognized(payload.to_vec())
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Ready => f.write_str("Ready"),
            Message::Unrecognized(p) => f
                .debug_tuple("Unrecognized")
                .field(&String::from_utf8_lossy(p))
                .finish(),
            Message::ReadError(e) => f.debug_tuple("ReadError").field(e).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_ready_only() {
        assert_eq!(Message::classify(b"READY=1"), Message::Ready);
        for p in [
            &b"READY=0"[..],
            b"READY=1\n",
            b" READY=1",
            b"ready=1",
            b"READY=1\nSTATUS=up",
            b"",
        ] {
            assert_eq!(Message::classify(p), Message::Unrecognized(p.to_vec()));
        }
    }

    #[test]
    fn test_debug_renders_payload_text() {
        let m = Message::classify(b"STATUS=warming");
        assert_eq!(format!("{m:?}"), r#"Unrecognized("STATUS=warming")"#);
    }
}
