//! Clock-sync probes against the remote supervisor.
//!
//! A probe is an 18-byte datagram: the ASCII tag `tt`, the originator's
//! send time, and the responder's wall time, both as big-endian `f64`
//! seconds. The responder echoes the origin time and fills in its own
//! clock; the originator then estimates the offset assuming symmetric
//! path delay.

use crate::error::{LinkError, Result};

pub const PROBE_TAG: &[u8; 2] = b"tt";
pub const PROBE_LEN: usize = 18;

/// Number of offset samples folded into one estimate.
pub const SAMPLE_TARGET: usize = 10;

/// One clock probe, in either direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockProbe {
    /// Originator's send time, seconds since the UNIX epoch.
    pub origin_time: f64,
    /// Responder's wall time, zero on the outbound leg.
    pub remote_time: f64,
}

impl ClockProbe {
    /// Outbound probe carrying only the local send time.
    pub fn request(origin_time: f64) -> Self {
        ClockProbe {
            origin_time,
            remote_time: 0.0,
        }
    }

    /// Response echoing the origin time with the responder's clock.
    pub fn reply_to(self, remote_time: f64) -> Self {
        ClockProbe {
            origin_time: self.origin_time,
            remote_time,
        }
    }

    pub fn encode(&self) -> [u8; PROBE_LEN] {
        let mut pkt = [0u8; PROBE_LEN];
        pkt[..2].copy_from_slice(PROBE_TAG);
        pkt[2..10].copy_from_slice(&self.origin_time.to_be_bytes());
        pkt[10..18].copy_from_slice(&self.remote_time.to_be_bytes());
        pkt
    }

    pub fn decode(pkt: &[u8]) -> Result<ClockProbe> {
        if pkt.len() != PROBE_LEN || &pkt[..2] != PROBE_TAG {
            return Err(LinkError::schema_violation(format!(
                "not a clock probe: {} bytes",
                pkt.len()
            )));
        }
        let mut origin = [0u8; 8];
        let mut remote = [0u8; 8];
        origin.copy_from_slice(&pkt[2..10]);
        remote.copy_from_slice(&pkt[10..18]);
        Ok(ClockProbe {
            origin_time: f64::from_be_bytes(origin),
            remote_time: f64::from_be_bytes(remote),
        })
    }
}

/// A settled clock-offset estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetEstimate {
    /// Median offset in seconds; add to local time to get remote time.
    pub offset: f64,
    /// Lowest sample relative to the median, non-positive.
    pub low_spread: f64,
    /// Highest sample relative to the median, non-negative.
    pub high_spread: f64,
}

/// Accumulates round-trip samples into a median offset.
#[derive(Debug, Clone, Default)]
pub struct OffsetEstimator {
    samples: Vec<f64>,
}

impl OffsetEstimator {
    pub fn new() -> Self {
        OffsetEstimator::default()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Fold in one completed round trip.
    ///
    /// `reply` is the responder's echo, `now` the local receive time in
    /// seconds. Returns the estimate once [`SAMPLE_TARGET`] samples have
    /// accumulated, clearing the sample set for the next round.
    pub fn add_round_trip(&mut self, reply: &ClockProbe, now: f64) -> Option<OffsetEstimate> {
        let offset = reply.remote_time + (now - reply.origin_time) / 2.0 - now;
        self.samples.push(offset);
        if self.samples.len() < SAMPLE_TARGET {
            return None;
        }

        self.samples
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = median_of_sorted(&self.samples);
        let estimate = OffsetEstimate {
            offset: median,
            low_spread: self.samples[0] - median,
            high_spread: self.samples[self.samples.len() - 1] - median,
        };
        self.samples.clear();
        Some(estimate)
    }
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_round_trip() {
        let probe = ClockProbe::request(1_700_000_123.456);
        let pkt = probe.encode();
        assert_eq!(pkt.len(), PROBE_LEN);
        assert_eq!(&pkt[..2], b"tt");
        assert_eq!(ClockProbe::decode(&pkt).unwrap(), probe);

        let reply = probe.reply_to(1_700_000_123.756);
        let echoed = ClockProbe::decode(&reply.encode()).unwrap();
        assert_eq!(echoed.origin_time, probe.origin_time);
        assert_eq!(echoed.remote_time, 1_700_000_123.756);
    }

    #[test]
    fn decode_rejects_wrong_shape() {
        assert!(ClockProbe::decode(b"tt short").is_err());
        let mut pkt = ClockProbe::request(1.0).encode();
        pkt[0] = b'x';
        assert!(ClockProbe::decode(&pkt).is_err());
    }

    #[test]
    fn symmetric_delay_yields_exact_offset() {
        // Remote clock runs 2.5s ahead; 100ms each way.
        let origin = 1000.0;
        let remote = origin + 0.1 + 2.5;
        let now = origin + 0.2;
        let reply = ClockProbe {
            origin_time: origin,
            remote_time: remote,
        };
        let mut est = OffsetEstimator::new();
        let mut result = None;
        for _ in 0..SAMPLE_TARGET {
            result = est.add_round_trip(&reply, now);
        }
        let estimate = result.expect("ten samples settle the estimate");
        assert!((estimate.offset - 2.5).abs() < 1e-9);
        assert!(estimate.low_spread.abs() < 1e-9);
        assert!(estimate.high_spread.abs() < 1e-9);
    }

    #[test]
    fn median_discards_outliers() {
        let mut est = OffsetEstimator::new();
        let mut result = None;
        for i in 0..SAMPLE_TARGET {
            // One sample with a wildly asymmetric path delay.
            let skew = if i == 3 { 5.0 } else { 0.0 };
            let reply = ClockProbe {
                origin_time: 1000.0,
                remote_time: 1001.0 + skew,
            };
            result = est.add_round_trip(&reply, 1000.0);
        }
        let estimate = result.unwrap();
        assert!((estimate.offset - 1.0).abs() < 1e-9);
        assert!(estimate.high_spread > 4.9);
        assert_eq!(est.sample_count(), 0);
    }
}
