//! Delta-compressed vehicle telemetry.

pub mod delta;
pub mod schema;
pub mod snapshot;

pub use delta::{DeltaDecoder, DeltaEncoder, DeltaOutcome};
pub use schema::{validate_schema, FieldId, FieldSpec, FIELDS, FIELD_COUNT};
pub use snapshot::Snapshot;
