//! # Command Buffer
//!
//! Structural mutations requested while a process iterates are appended to
//! a byte log and replayed front-to-back once iteration ends.
//!
//! ## Format
//!
//! ```text
//! [1 byte: tag (CREATE/DESTROY/ADD/REMOVE)]
//! [1 byte: flags (HAS_PAYLOAD)]
//! [4 bytes: entity ID]
//! [4 bytes: component ID, or component count for CREATE]
//! [4 bytes: payload length]
//! [N bytes: payload]
//!
//! CREATE payload, repeated per component:
//! [4 bytes: component ID][4 bytes: length][N bytes: bytes]
//! ```
//!
//! The log is cleared, never freed, so steady-state frames do not allocate.

use super::component::ComponentId;
use super::entity::EntityId;

const HEADER_SIZE: usize = 1 + 1 + 4 + 4 + 4;
const FLAG_HAS_PAYLOAD: u8 = 1;

/// Command record tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum CommandTag {
    Create = 1,
    Destroy = 2,
    Add = 3,
    Remove = 4,
}

impl CommandTag {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Create),
            2 => Some(Self::Destroy),
            3 => Some(Self::Add),
            4 => Some(Self::Remove),
            _ => None,
        }
    }
}

/// One deferred structural mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// Materialize an entity whose ID was claimed when the command was queued.
    CreateEntity {
        /// The pre-claimed ID.
        entity: EntityId,
        /// Initial components.
        components: PackedComponents<'a>,
    },
    /// Destroy an entity.
    DestroyEntity {
        /// Target entity.
        entity: EntityId,
    },
    /// Add a component, optionally with its payload.
    AddComponent {
        /// Target entity.
        entity: EntityId,
        /// Component to add.
        component: ComponentId,
        /// Payload bytes; `None` leaves the payload zeroed (or untouched
        /// if the entity already has the component).
        payload: Option<&'a [u8]>,
    },
    /// Remove a component.
    RemoveComponent {
        /// Target entity.
        entity: EntityId,
        /// Component to remove.
        component: ComponentId,
    },
}

/// Encoded `(component, bytes)` list carried by a create command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackedComponents<'a> {
    count: usize,
    bytes: &'a [u8],
}

impl<'a> PackedComponents<'a> {
    /// Number of components.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Checks if the list is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterates the packed components in the order they were queued.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &'a [u8])> + Clone {
        let mut rest = self.bytes;
        std::iter::from_fn(move || {
            let id = read_u32(rest, 0)?;
            let len = read_u32(rest, 4)? as usize;
            let bytes = rest.get(8..8 + len)?;
            rest = &rest[8 + len..];
            Some((ComponentId::from_raw(id), bytes))
        })
    }
}

#[inline]
fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes.get(at..at + 4).map(bytemuck::pod_read_unaligned)
}

// ============================================================================
// BUFFER
// ============================================================================

/// Append-only log of deferred commands.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    bytes: Vec<u8>,
    count: usize,
}

impl CommandBuffer {
    /// Creates a buffer with `capacity` bytes reserved.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            count: 0,
        }
    }

    /// Queues an entity creation.
    pub fn push_create(&mut self, entity: EntityId, components: &[(ComponentId, &[u8])]) {
        let payload_len: usize = components.iter().map(|(_, bytes)| 8 + bytes.len()).sum();
        self.write_header(CommandTag::Create, FLAG_HAS_PAYLOAD, entity, components.len() as u32, payload_len);
        for (id, bytes) in components {
            self.bytes.extend_from_slice(&id.raw().to_ne_bytes());
            self.bytes.extend_from_slice(&(bytes.len() as u32).to_ne_bytes());
            self.bytes.extend_from_slice(bytes);
        }
    }

    /// Queues an entity destruction.
    pub fn push_destroy(&mut self, entity: EntityId) {
        self.write_header(CommandTag::Destroy, 0, entity, 0, 0);
    }

    /// Queues a component addition.
    pub fn push_add(&mut self, entity: EntityId, component: ComponentId, payload: Option<&[u8]>) {
        match payload {
            Some(bytes) => {
                self.write_header(CommandTag::Add, FLAG_HAS_PAYLOAD, entity, component.raw(), bytes.len());
                self.bytes.extend_from_slice(bytes);
            }
            None => self.write_header(CommandTag::Add, 0, entity, component.raw(), 0),
        }
    }

    /// Queues a component removal.
    pub fn push_remove(&mut self, entity: EntityId, component: ComponentId) {
        self.write_header(CommandTag::Remove, 0, entity, component.raw(), 0);
    }

    /// Iterates queued commands in FIFO order.
    #[must_use]
    pub fn iter(&self) -> CommandIter<'_> {
        CommandIter { rest: &self.bytes }
    }

    /// Number of queued commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Checks if nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bytes currently used by the log.
    #[inline]
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Bytes reserved by the log.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    /// Empties the log, keeping its allocation.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.count = 0;
    }

    fn write_header(&mut self, tag: CommandTag, flags: u8, entity: EntityId, component: u32, payload_len: usize) {
        self.bytes.reserve(HEADER_SIZE + payload_len);
        self.bytes.push(tag as u8);
        self.bytes.push(flags);
        self.bytes.extend_from_slice(&entity.to_bits().to_ne_bytes());
        self.bytes.extend_from_slice(&component.to_ne_bytes());
        self.bytes.extend_from_slice(&(payload_len as u32).to_ne_bytes());
        self.count += 1;
    }
}

/// FIFO iterator over a [`CommandBuffer`].
pub struct CommandIter<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for CommandIter<'a> {
    type Item = Command<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = self.rest.get(..HEADER_SIZE)?;
        let tag = CommandTag::from_u8(header[0]);
        let has_payload = header[1] & FLAG_HAS_PAYLOAD != 0;
        let entity = EntityId::from_bits(read_u32(header, 2)?);
        let component = read_u32(header, 6)?;
        let len = read_u32(header, 10)? as usize;
        let Some(payload) = self.rest.get(HEADER_SIZE..HEADER_SIZE + len) else {
            debug_assert!(false, "truncated command record");
            self.rest = &[];
            return None;
        };
        self.rest = &self.rest[HEADER_SIZE + len..];

        let command = match tag? {
            CommandTag::Create => Command::CreateEntity {
                entity,
                components: PackedComponents {
                    count: component as usize,
                    bytes: payload,
                },
            },
            CommandTag::Destroy => Command::DestroyEntity { entity },
            CommandTag::Add => Command::AddComponent {
                entity,
                component: ComponentId::from_raw(component),
                payload: has_payload.then_some(payload),
            },
            CommandTag::Remove => Command::RemoveComponent {
                entity,
                component: ComponentId::from_raw(component),
            },
        };
        Some(command)
    }
}
