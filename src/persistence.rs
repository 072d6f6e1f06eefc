//! Pack/unpack of constraints and material state into flat numeric buffers
//!
//! A [`DataBuffer`] is an ordered list of named integer or real arrays. Entities
//! implement [`Persist`] to write themselves into a buffer and rebuild from one;
//! a [`Channel`] moves buffers to and from a store keyed by a database tag.
//! The contract is a logical round trip, not a fixed byte layout.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};

/// Payload of one named field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldData {
    Ints(Vec<i64>),
    Reals(Vec<f64>),
}

/// Ordered collection of named numeric fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataBuffer {
    fields: Vec<(String, FieldData)>,
}

impl DataBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn put(&mut self, name: &str, data: FieldData) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = data,
            None => self.fields.push((name.to_string(), data)),
        }
    }

    fn get(&self, name: &str) -> FEAResult<&FieldData> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
            .ok_or_else(|| FEAError::Persistence(format!("missing field '{name}'")))
    }

    pub fn put_ints(&mut self, name: &str, values: &[i64]) {
        self.put(name, FieldData::Ints(values.to_vec()));
    }

    pub fn put_reals(&mut self, name: &str, values: &[f64]) {
        self.put(name, FieldData::Reals(values.to_vec()));
    }

    pub fn ints(&self, name: &str) -> FEAResult<&[i64]> {
        match self.get(name)? {
            FieldData::Ints(v) => Ok(v),
            FieldData::Reals(_) => Err(FEAError::Persistence(format!(
                "field '{name}' holds reals, expected integers"
            ))),
        }
    }

    pub fn reals(&self, name: &str) -> FEAResult<&[f64]> {
        match self.get(name)? {
            FieldData::Reals(v) => Ok(v),
            FieldData::Ints(_) => Err(FEAError::Persistence(format!(
                "field '{name}' holds integers, expected reals"
            ))),
        }
    }

    /// Integer field that must have exactly `len` entries
    pub fn ints_exact(&self, name: &str, len: usize) -> FEAResult<&[i64]> {
        let v = self.ints(name)?;
        if v.len() != len {
            return Err(FEAError::Persistence(format!(
                "field '{name}' has {} entries, expected {len}",
                v.len()
            )));
        }
        Ok(v)
    }

    /// Real field that must have exactly `len` entries
    pub fn reals_exact(&self, name: &str, len: usize) -> FEAResult<&[f64]> {
        let v = self.reals(name)?;
        if v.len() != len {
            return Err(FEAError::Persistence(format!(
                "field '{name}' has {} entries, expected {len}",
                v.len()
            )));
        }
        Ok(v)
    }

    pub fn to_json(&self) -> FEAResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> FEAResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Narrow a stored integer to a tag
pub fn as_tag(value: i64, field: &str) -> FEAResult<i32> {
    i32::try_from(value)
        .map_err(|_| FEAError::Persistence(format!("field '{field}': {value} is not a valid tag")))
}

/// Narrow a stored integer to a count or index
pub fn as_index(value: i64, field: &str) -> FEAResult<usize> {
    usize::try_from(value).map_err(|_| {
        FEAError::Persistence(format!("field '{field}': {value} is not a valid index"))
    })
}

/// Store that buffers are sent to and received from
pub trait Channel {
    fn send_buffer(&mut self, db_tag: i32, buffer: DataBuffer) -> FEAResult<()>;
    fn recv_buffer(&self, db_tag: i32) -> FEAResult<DataBuffer>;
}

/// In-process channel backed by a map
#[derive(Debug, Default)]
pub struct MemoryChannel {
    store: HashMap<i32, DataBuffer>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Channel for MemoryChannel {
    fn send_buffer(&mut self, db_tag: i32, buffer: DataBuffer) -> FEAResult<()> {
        self.store.insert(db_tag, buffer);
        Ok(())
    }

    fn recv_buffer(&self, db_tag: i32) -> FEAResult<DataBuffer> {
        self.store
            .get(&db_tag)
            .cloned()
            .ok_or_else(|| FEAError::Persistence(format!("nothing stored under db tag {db_tag}")))
    }
}

/// Entities that can be packed into a [`DataBuffer`]
pub trait Persist: Sized {
    fn send_data(&self, buffer: &mut DataBuffer);
    fn recv_data(buffer: &DataBuffer) -> FEAResult<Self>;

    fn send_self<C: Channel + ?Sized>(&self, db_tag: i32, channel: &mut C) -> FEAResult<()> {
        let mut buffer = DataBuffer::new();
        self.send_data(&mut buffer);
        channel.send_buffer(db_tag, buffer)
    }

    fn recv_self<C: Channel + ?Sized>(db_tag: i32, channel: &C) -> FEAResult<Self> {
        Self::recv_data(&channel.recv_buffer(db_tag)?)
    }
}
