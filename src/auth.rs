//! HMAC-authenticated datagram channel.
//!
//! Packet layout, shared with the remote supervisor:
//!
//! ```text
//! pkt[0..32]  HMAC-SHA256 of pkt[32..] under the pre-shared key
//! pkt[32..40] sender timestamp, milliseconds since the UNIX epoch, big endian
//! pkt[40..]   payload
//! ```
//!
//! Verification enforces a freshness window around the receiver's clock and
//! rejects any timestamp already accepted inside that window. The seen-set
//! is in memory only; a restart forgets it, which the window bounds the
//! exposure of.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::{AuthError, Result};

type HmacSha256 = Hmac<Sha256>;

const MAC_LEN: usize = 32;
const TS_LEN: usize = 8;
const HEADER_LEN: usize = MAC_LEN + TS_LEN;

/// Accept timestamps within this many milliseconds of local time.
pub const DEFAULT_REPLAY_WINDOW_MS: u64 = 180_000;

/// A verified packet: when it was sent and what it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedMessage {
    pub timestamp: u64,
    pub payload: Vec<u8>,
}

/// Signs and verifies datagrams with a pre-shared key.
pub struct SignedChannel {
    key: Vec<u8>,
    window_ms: u64,
    /// Accepted timestamps inside the current window, kept sorted.
    timestamps_seen: Vec<u64>,
}

impl SignedChannel {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self::with_window(key, DEFAULT_REPLAY_WINDOW_MS)
    }

    pub fn with_window(key: impl Into<Vec<u8>>, window_ms: u64) -> Self {
        SignedChannel {
            key: key.into(),
            window_ms,
            timestamps_seen: Vec::new(),
        }
    }

    /// Wrap `payload` in a signed packet stamped with the current time.
    pub fn build_message(&self, payload: &[u8]) -> Vec<u8> {
        self.build_message_at(payload, now_ms())
    }

    /// Wrap `payload` with an explicit timestamp.
    pub fn build_message_at(&self, payload: &[u8], timestamp: u64) -> Vec<u8> {
        let mut msg = Vec::with_capacity(HEADER_LEN + payload.len());
        msg.extend_from_slice(&timestamp.to_be_bytes());
        msg.extend_from_slice(payload);

        let mut pkt = Vec::with_capacity(MAC_LEN + msg.len());
        pkt.extend_from_slice(&sign(&self.key, &msg));
        pkt.extend_from_slice(&msg);
        pkt
    }

    /// Verify `pkt` against the current time.
    pub fn verify_message(&mut self, pkt: &[u8]) -> Result<VerifiedMessage, AuthError> {
        self.verify_message_at(pkt, now_ms())
    }

    /// Verify `pkt`, treating `now` as the receiver's clock.
    ///
    /// Check order matters: the signature is checked before any timestamp
    /// state is consulted or mutated, so unauthenticated traffic cannot
    /// disturb the replay window.
    pub fn verify_message_at(
        &mut self,
        pkt: &[u8],
        now: u64,
    ) -> Result<VerifiedMessage, AuthError> {
        if pkt.len() < HEADER_LEN {
            return Err(AuthError::TooShort { len: pkt.len() });
        }

        let (sent_mac, msg) = pkt.split_at(MAC_LEN);
        let calc_mac = sign(&self.key, msg);
        if sent_mac.ct_eq(&calc_mac).unwrap_u8() == 0 {
            return Err(AuthError::BadSignature);
        }

        let mut ts_bytes = [0u8; TS_LEN];
        ts_bytes.copy_from_slice(&msg[..TS_LEN]);
        let timestamp = u64::from_be_bytes(ts_bytes);

        let min_time = now.saturating_sub(self.window_ms);
        let max_time = now.saturating_add(self.window_ms);

        // Timestamps below the window floor can never be accepted again,
        // so they no longer need replay tracking.
        let stale = self
            .timestamps_seen
            .iter()
            .take_while(|&&ts| ts < min_time)
            .count();
        if stale > 0 {
            self.timestamps_seen.drain(..stale);
        }

        if timestamp < min_time {
            warn!(timestamp, min_time, "rejected stale packet");
            return Err(AuthError::TooOld { timestamp });
        }
        if timestamp > max_time {
            warn!(timestamp, max_time, "rejected future-dated packet");
            return Err(AuthError::TooNew { timestamp });
        }
        if self.timestamps_seen.binary_search(&timestamp).is_ok() {
            warn!(timestamp, "rejected replayed packet");
            return Err(AuthError::Replayed { timestamp });
        }

        let ipnt = self.timestamps_seen.partition_point(|&ts| ts < timestamp);
        self.timestamps_seen.insert(ipnt, timestamp);

        Ok(VerifiedMessage {
            timestamp,
            payload: msg[TS_LEN..].to_vec(),
        })
    }
}

fn sign(key: &[u8], msg: &[u8]) -> [u8; MAC_LEN] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
