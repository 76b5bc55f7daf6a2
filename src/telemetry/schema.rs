//! Telemetry field schema.
//!
//! The field order, bit widths and signedness below are a wire contract
//! shared with the vehicle-bus firmware: both ends walk this table in
//! the same order when encoding or decoding a telemetry frame. The table
//! is static data known at build time; fields are addressed by
//! [`FieldId`], never by name lookup at runtime.

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

/// Metadata for one telemetry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Wire name, matching the firmware's field table.
    pub name: &'static str,
    /// Encoded width in bits.
    pub bits: u32,
    /// Whether the value is two's-complement signed.
    pub signed: bool,
}

macro_rules! field_table {
    ($(($variant:ident, $name:literal, $bits:literal, $signed:literal)),+ $(,)?) => {
        /// Identifier of a telemetry field, in wire order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(usize)]
        pub enum FieldId {
            $($variant),+
        }

        /// Field metadata in wire order.
        pub const FIELDS: [FieldSpec; FIELD_COUNT] = [
            $(FieldSpec { name: $name, bits: $bits, signed: $signed }),+
        ];

        impl FieldId {
            /// Every field, in wire order.
            pub const ALL: [FieldId; FIELD_COUNT] = [$(FieldId::$variant),+];
        }

        /// Number of fields in the schema.
        pub const FIELD_COUNT: usize = [$($name),+].len();
    };
}

field_table! {
    (Wrc3, "wrc3", 25, false),
    (Wrc1, "wrc1", 13, false),
    (Wrc2, "wrc2", 13, false),
    (MgaRpm, "mga_rpm", 15, true),
    (MgbRpm, "mgb_rpm", 15, true),
    (RawSpeed, "rawspeed", 14, false),
    (HvAmps, "hv_amps", 16, true),
    (MgaAmps, "mga_amps", 16, true),
    (MgbAmps, "mgb_amps", 16, true),
    (HvVolts, "hv_volts", 16, false),
    (MgaVolts, "mga_volts", 16, false),
    (MgbVolts, "mgb_volts", 16, false),
    (Steer, "steer", 16, true),
    (BrakePct, "brake_pct", 8, false),
    (AccelPct, "accel_pct", 8, false),
    (Rpm, "rpm", 14, false),
    (FuelCtr, "fuel_ctr", 21, false),
    (ClimatePower, "climate_power", 7, false),
    (ClimateMode, "climate_mode", 2, false),
    (HeatAc, "heat_ac", 2, false),
    (BatteryRawSoc, "battery_raw_soc", 8, false),
    (BatterySoc, "battery_soc", 8, false),
    (RawOdometer, "raw_odometer", 25, false),
    (Range, "range", 16, false),
    (ScFlags, "scflags", 24, false),
    (ClutchState, "clutch_state", 8, false),
    (RawCcSpeed, "rawccspeed", 13, false),
    (CcBtn, "ccbtn", 4, false),
    (RadioBtn, "radiobtn", 4, false),
    (CoolantTemp, "coolant_temp", 8, false),
    (IntakeTemp, "intake_temp", 8, false),
    (BatteryTemp, "battery_temp", 8, false),
    (Lat, "lat", 31, true),
    (Lon, "lon", 31, true),
    (AirTemp1, "air_temp1", 8, false),
    (AirTemp2, "air_temp2", 8, false),
    (AirPressure, "air_pressure", 8, false),
    (TireFtLf, "tire_ft_lf", 8, false),
    (TireRrLf, "tire_rr_lf", 8, false),
    (TireFtRt, "tire_ft_rt", 8, false),
    (TireRrRt, "tire_rr_rt", 8, false),
    (OilLife, "oil_life", 8, false),
    (FanSpeed, "fanspeed", 8, false),
    (Vent, "vent", 3, false),
    (SelectFanSpeed, "select_fanspeed", 5, false),
    (SelectTemp, "select_temp", 6, false),
    (Recirc, "recirc", 2, false),
    (Gear, "gear", 3, false),
    (DriveMode, "drive_mode", 2, false),
    (RearDefrost, "rear_defrost", 1, false),
}

impl FieldId {
    /// Position of this field in wire order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Metadata for this field.
    pub fn spec(self) -> &'static FieldSpec {
        &FIELDS[self.index()]
    }

    /// Look up a field by its wire name.
    pub fn by_name(name: &str) -> Option<FieldId> {
        FIELDS
            .iter()
            .position(|spec| spec.name == name)
            .map(|i| FieldId::ALL[i])
    }
}

/// Validate the field table against the codec's representational limits.
///
/// Every value must fit an `i32` snapshot slot and the bit cursor's 32-bit
/// read ceiling. A failure here is a programmer error in the table, not a
/// runtime condition; callers treat it as fatal.
pub fn validate_schema() -> Result<()> {
    for spec in &FIELDS {
        let max_bits = if spec.signed { 32 } else { 31 };
        if spec.bits == 0 || spec.bits > max_bits {
            return Err(LinkError::schema_violation(format!(
                "field '{}' has invalid width {} (signed={})",
                spec.name, spec.bits, spec.signed
            )));
        }
    }
    Ok(())
}
