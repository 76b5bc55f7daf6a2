//! Periodic vehicle status report.
//!
//! A fixed 22-byte big-endian record summarizing the vehicle state for the
//! remote supervisor. Sent as the payload of an authenticated datagram; the
//! layout is shared with the server-side ingester.

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

pub const REPORT_LEN: usize = 22;

pub const FLAG_POWER_ON: u8 = 1;
pub const FLAG_KEY_ON: u8 = 2;
pub const FLAG_PRECONDITIONING: u8 = 4;
pub const FLAG_LOCK: u8 = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Outside air temperature, raw sensor units.
    pub air_temp: u8,
    /// Cabin temperature, offset by +40 and clamped to a byte.
    pub cabin_temp: u8,
    pub oil_life: u8,
    pub tire_ft_lf: u8,
    pub tire_rr_lf: u8,
    pub tire_ft_rt: u8,
    pub tire_rr_rt: u8,
    /// `FLAG_*` bits.
    pub flags: u8,
    pub odometer: u32,
    /// Latitude in milliarcseconds, signed.
    pub lat: i32,
    /// Longitude in milliarcseconds, signed.
    pub lon: i32,
    /// Auxiliary battery voltage in decivolts.
    pub battery_volts: u16,
}

impl StatusReport {
    /// Store a cabin temperature in Celsius, applying the wire offset.
    pub fn set_cabin_temp_celsius(&mut self, celsius: i32) {
        self.cabin_temp = (celsius + 40).clamp(0, 255) as u8;
    }

    pub fn power_on(&self) -> bool {
        self.flags & FLAG_POWER_ON != 0
    }

    pub fn key_on(&self) -> bool {
        self.flags & FLAG_KEY_ON != 0
    }

    pub fn preconditioning(&self) -> bool {
        self.flags & FLAG_PRECONDITIONING != 0
    }

    pub fn locked(&self) -> bool {
        self.flags & FLAG_LOCK != 0
    }

    pub fn encode(&self) -> [u8; REPORT_LEN] {
        let mut out = [0u8; REPORT_LEN];
        out[0] = self.air_temp;
        out[1] = self.cabin_temp;
        out[2] = self.oil_life;
        out[3] = self.tire_ft_lf;
        out[4] = self.tire_rr_lf;
        out[5] = self.tire_ft_rt;
        out[6] = self.tire_rr_rt;
        out[7] = self.flags;
        out[8..12].copy_from_slice(&self.odometer.to_be_bytes());
        out[12..16].copy_from_slice(&self.lat.to_be_bytes());
        out[16..20].copy_from_slice(&self.lon.to_be_bytes());
        out[20..22].copy_from_slice(&self.battery_volts.to_be_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<StatusReport> {
        if buf.len() != REPORT_LEN {
            return Err(LinkError::schema_violation(format!(
                "status report is {} bytes, expected {REPORT_LEN}",
                buf.len()
            )));
        }
        let be_u32 = |i: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&buf[i..i + 4]);
            u32::from_be_bytes(b)
        };
        Ok(StatusReport {
            air_temp: buf[0],
            cabin_temp: buf[1],
            oil_life: buf[2],
            tire_ft_lf: buf[3],
            tire_rr_lf: buf[4],
            tire_ft_rt: buf[5],
            tire_rr_rt: buf[6],
            flags: buf[7],
            odometer: be_u32(8),
            lat: be_u32(12) as i32,
            lon: be_u32(16) as i32,
            battery_volts: u16::from_be_bytes([buf[20], buf[21]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StatusReport {
        StatusReport {
            air_temp: 18,
            cabin_temp: 62,
            oil_life: 87,
            tire_ft_lf: 35,
            tire_rr_lf: 34,
            tire_ft_rt: 35,
            tire_rr_rt: 33,
            flags: FLAG_POWER_ON | FLAG_LOCK,
            odometer: 123_456,
            lat: 152_409_780,
            lon: -298_979_280,
            battery_volts: 126,
        }
    }

    #[test]
    fn round_trip() {
        let report = sample();
        let wire = report.encode();
        assert_eq!(wire.len(), REPORT_LEN);
        assert_eq!(StatusReport::decode(&wire).unwrap(), report);
    }

    #[test]
    fn known_layout() {
        let wire = sample().encode();
        assert_eq!(wire[0], 18);
        assert_eq!(wire[7], FLAG_POWER_ON | FLAG_LOCK);
        assert_eq!(&wire[8..12], &123_456u32.to_be_bytes());
        assert_eq!(&wire[16..20], &(-298_979_280i32).to_be_bytes());
        assert_eq!(&wire[20..22], &126u16.to_be_bytes());
    }

    #[test]
    fn flag_accessors() {
        let report = sample();
        assert!(report.power_on());
        assert!(report.locked());
        assert!(!report.key_on());
        assert!(!report.preconditioning());
    }

    #[test]
    fn cabin_temp_offset_and_clamp() {
        let mut report = StatusReport::default();
        report.set_cabin_temp_celsius(22);
        assert_eq!(report.cabin_temp, 62);
        report.set_cabin_temp_celsius(-55);
        assert_eq!(report.cabin_temp, 0);
        report.set_cabin_temp_celsius(300);
        assert_eq!(report.cabin_temp, 255);
    }

    #[test]
    fn wrong_size_rejected() {
        assert!(StatusReport::decode(&[0u8; 21]).is_err());
        assert!(StatusReport::decode(&[0u8; 23]).is_err());
    }
}
