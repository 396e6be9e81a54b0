//! # Component Cursors
//!
//! Serialize hooks write through a [`ComponentWriter`], deserialize hooks
//! read through a [`ComponentReader`]. Both speak MessagePack and both carry
//! the snapshot's [`EntityLookup`], so a payload that points at another
//! entity stores the snapshot-local ID instead of the live one.
//!
//! ```rust,ignore
//! ComponentType::of::<Link>("link")
//!     .with_serialize(|writer, bytes| {
//!         let link: &Link = bytemuck::from_bytes(bytes);
//!         writer.write_entity(link.target)?;
//!         writer.write_f32(link.strength)
//!     })
//!     .with_deserialize(|reader, bytes| {
//!         let link: &mut Link = bytemuck::from_bytes_mut(bytes);
//!         link.target = reader.read_entity()?;
//!         link.strength = reader.read_f32()?;
//!         Ok(())
//!     });
//! ```

use std::collections::HashMap;
use std::fmt::Debug;

use crate::ecs::EntityId;
use crate::error::{EcpsError, EcpsResult};

#[inline]
pub(crate) fn encode_error(err: impl Debug) -> EcpsError {
    EcpsError::Encode(format!("{err:?}"))
}

#[inline]
pub(crate) fn decode_error(err: impl Debug) -> EcpsError {
    EcpsError::Decode(format!("{err:?}"))
}

// ============================================================================
// ENTITY LOOKUP
// ============================================================================

/// Two-way map between live entity IDs and snapshot-local IDs.
///
/// Local IDs are 1-based; 0 means "no entity".
#[derive(Clone, Debug, Default)]
pub struct EntityLookup {
    to_local: HashMap<EntityId, u32>,
    to_live: Vec<EntityId>,
}

impl EntityLookup {
    /// Creates an empty lookup.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a lookup from `(local, live)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, EntityId)>) -> Self {
        let mut lookup = Self::new();
        for (local, live) in pairs {
            lookup.insert(local, live);
        }
        lookup
    }

    /// Records that `local` stands for `live`.
    pub fn insert(&mut self, local: u32, live: EntityId) {
        if local == 0 {
            return;
        }
        let slot = (local - 1) as usize;
        if slot >= self.to_live.len() {
            self.to_live.resize(slot + 1, EntityId::NULL);
        }
        self.to_live[slot] = live;
        if !live.is_null() {
            self.to_local.insert(live, local);
        }
    }

    /// Returns the local ID of a live entity, 0 if it is not in the snapshot.
    #[inline]
    #[must_use]
    pub fn local_id(&self, live: EntityId) -> u32 {
        self.to_local.get(&live).copied().unwrap_or(0)
    }

    /// Returns the live entity behind a local ID.
    #[inline]
    #[must_use]
    pub fn live_id(&self, local: u32) -> Option<EntityId> {
        let slot = local.checked_sub(1)? as usize;
        self.to_live.get(slot).copied().filter(|id| !id.is_null())
    }

    /// Number of mapped entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.to_local.len()
    }

    /// Checks if nothing is mapped.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_local.is_empty()
    }
}

// ============================================================================
// WRITER
// ============================================================================

/// Append-only MessagePack writer over one component blob.
pub struct ComponentWriter<'a> {
    buf: &'a mut Vec<u8>,
    lookup: &'a EntityLookup,
}

impl<'a> ComponentWriter<'a> {
    /// Creates a writer appending to `buf`.
    pub fn new(buf: &'a mut Vec<u8>, lookup: &'a EntityLookup) -> Self {
        Self { buf, lookup }
    }

    /// Returns the entity lookup of the snapshot being written.
    #[inline]
    #[must_use]
    pub fn lookup(&self) -> &EntityLookup {
        self.lookup
    }

    /// Writes a `u8`.
    pub fn write_u8(&mut self, value: u8) -> EcpsResult<()> {
        rmp::encode::write_u8(&mut *self.buf, value).map_err(encode_error)
    }

    /// Writes a `u32`.
    pub fn write_u32(&mut self, value: u32) -> EcpsResult<()> {
        rmp::encode::write_u32(&mut *self.buf, value).map_err(encode_error)
    }

    /// Writes an `i32`.
    pub fn write_i32(&mut self, value: i32) -> EcpsResult<()> {
        rmp::encode::write_i32(&mut *self.buf, value).map_err(encode_error)
    }

    /// Writes a `u64`.
    pub fn write_u64(&mut self, value: u64) -> EcpsResult<()> {
        rmp::encode::write_u64(&mut *self.buf, value).map_err(encode_error)
    }

    /// Writes an `f32`.
    pub fn write_f32(&mut self, value: f32) -> EcpsResult<()> {
        rmp::encode::write_f32(&mut *self.buf, value).map_err(encode_error)
    }

    /// Writes a `bool`.
    pub fn write_bool(&mut self, value: bool) -> EcpsResult<()> {
        rmp::encode::write_bool(&mut *self.buf, value).map_err(encode_error)
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) -> EcpsResult<()> {
        rmp::encode::write_str(&mut *self.buf, value).map_err(encode_error)
    }

    /// Writes a length-prefixed byte string.
    pub fn write_bin(&mut self, value: &[u8]) -> EcpsResult<()> {
        rmp::encode::write_bin(&mut *self.buf, value).map_err(encode_error)
    }

    /// Writes an entity reference as its snapshot-local ID.
    ///
    /// Null references and entities outside the snapshot are written as 0.
    pub fn write_entity(&mut self, entity: EntityId) -> EcpsResult<()> {
        let local = self.lookup.local_id(entity);
        if local == 0 && !entity.is_null() {
            tracing::warn!(%entity, "reference to an entity outside the snapshot written as null");
        }
        self.write_u32(local)
    }
}

// ============================================================================
// READER
// ============================================================================

/// Forward-only MessagePack reader over one component blob.
pub struct ComponentReader<'a> {
    buf: &'a [u8],
    lookup: &'a EntityLookup,
}

impl<'a> ComponentReader<'a> {
    /// Creates a reader over `buf`.
    pub fn new(buf: &'a [u8], lookup: &'a EntityLookup) -> Self {
        Self { buf, lookup }
    }

    /// Returns the entity lookup of the snapshot being restored.
    #[inline]
    #[must_use]
    pub fn lookup(&self) -> &EntityLookup {
        self.lookup
    }

    /// Bytes left to read.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Reads a `u8`.
    pub fn read_u8(&mut self) -> EcpsResult<u8> {
        rmp::decode::read_int(&mut self.buf).map_err(decode_error)
    }

    /// Reads a `u32`.
    pub fn read_u32(&mut self) -> EcpsResult<u32> {
        rmp::decode::read_int(&mut self.buf).map_err(decode_error)
    }

    /// Reads an `i32`.
    pub fn read_i32(&mut self) -> EcpsResult<i32> {
        rmp::decode::read_int(&mut self.buf).map_err(decode_error)
    }

    /// Reads a `u64`.
    pub fn read_u64(&mut self) -> EcpsResult<u64> {
        rmp::decode::read_int(&mut self.buf).map_err(decode_error)
    }

    /// Reads an `f32`.
    pub fn read_f32(&mut self) -> EcpsResult<f32> {
        rmp::decode::read_f32(&mut self.buf).map_err(decode_error)
    }

    /// Reads a `bool`.
    pub fn read_bool(&mut self) -> EcpsResult<bool> {
        rmp::decode::read_bool(&mut self.buf).map_err(decode_error)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> EcpsResult<String> {
        let len = rmp::decode::read_str_len(&mut self.buf).map_err(decode_error)? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(decode_error)
    }

    /// Reads a length-prefixed byte string.
    pub fn read_bin(&mut self) -> EcpsResult<&'a [u8]> {
        let len = rmp::decode::read_bin_len(&mut self.buf).map_err(decode_error)? as usize;
        self.take(len)
    }

    /// Reads a byte string into `out`, which must match its length.
    pub fn read_bin_into(&mut self, out: &mut [u8]) -> EcpsResult<()> {
        let bytes = self.read_bin()?;
        if bytes.len() != out.len() {
            return Err(EcpsError::Decode(format!(
                "byte string is {} bytes, expected {}",
                bytes.len(),
                out.len()
            )));
        }
        out.copy_from_slice(bytes);
        Ok(())
    }

    /// Reads an entity reference and resolves it to the live entity.
    ///
    /// # Returns
    ///
    /// [`EntityId::NULL`] for 0 or for a local ID the snapshot does not
    /// contain.
    pub fn read_entity(&mut self) -> EcpsResult<EntityId> {
        let local = self.read_u32()?;
        Ok(self.lookup.live_id(local).unwrap_or(EntityId::NULL))
    }

    fn take(&mut self, len: usize) -> EcpsResult<&'a [u8]> {
        if len > self.buf.len() {
            return Err(EcpsError::Decode(format!(
                "need {len} bytes, {} left",
                self.buf.len()
            )));
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }
}
