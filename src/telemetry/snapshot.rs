use std::fmt;
use std::ops::{Index, IndexMut};

use crate::telemetry::schema::{FieldId, FIELD_COUNT, FIELDS};

/// One complete telemetry state: a value for every field in the schema.
///
/// Values are stored as `i32` regardless of wire width; unsigned fields
/// occupy the non-negative range. A fresh snapshot is all zeros, which is
/// what an incremental decode carries forward before the first full frame.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    values: [i32; FIELD_COUNT],
}

impl Snapshot {
    pub fn new() -> Self {
        Snapshot {
            values: [0; FIELD_COUNT],
        }
    }

    pub fn get(&self, field: FieldId) -> i32 {
        self.values[field.index()]
    }

    pub fn set(&mut self, field: FieldId, value: i32) {
        self.values[field.index()] = value;
    }

    /// Fields whose value differs from `other`, in wire order.
    pub fn changed_from(&self, other: &Snapshot) -> Vec<FieldId> {
        FieldId::ALL
            .into_iter()
            .filter(|f| self.get(*f) != other.get(*f))
            .collect()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot::new()
    }
}

impl Index<FieldId> for Snapshot {
    type Output = i32;

    fn index(&self, field: FieldId) -> &i32 {
        &self.values[field.index()]
    }
}

impl IndexMut<FieldId> for Snapshot {
    fn index_mut(&mut self, field: FieldId) -> &mut i32 {
        &mut self.values[field.index()]
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_struct("Snapshot");
        for (spec, value) in FIELDS.iter().zip(self.values.iter()) {
            map.field(spec.name, value);
        }
        map.finish()
    }
}
