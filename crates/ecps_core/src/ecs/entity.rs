//! # Entity Management
//!
//! Entities are lightweight identifiers consisting of:
//! - A 16-bit index into the entity directory
//! - A 16-bit generation counter for safe reuse
//!
//! Generations start at 1 and skip 0 when they wrap, so a packed ID of 0
//! never names a live entity. Archetype records use that value as their
//! free-slot sentinel.

use std::fmt;

/// Largest number of entity IDs one allocator can hand out.
pub const MAX_ENTITY_CAPACITY: usize = u16::MAX as usize;

/// Unique identifier for an entity.
///
/// The ID is split into two parts:
/// - Lower 16 bits: Index into the entity directory
/// - Upper 16 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Null/invalid entity ID.
    pub const NULL: Self = Self(0);

    /// Creates a new entity ID from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - The directory index
    /// * `generation` - The generation counter (0 only for `NULL`)
    #[inline]
    #[must_use]
    pub const fn new(index: u16, generation: u16) -> Self {
        Self(((generation as u32) << 16) | (index as u32))
    }

    /// Rebuilds an ID from its packed form, as stored in the leading
    /// field of every archetype record.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the packed form of the ID.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Returns the index portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u16 {
        self.0 as u16
    }

    /// Returns the generation portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "{}v{}", self.index(), self.generation())
        }
    }
}

// ============================================================================
// ID ALLOCATOR
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
struct Slot {
    generation: u16,
    in_use: bool,
}

/// Issues and reclaims generational entity IDs.
///
/// Slots are created lazily up to the configured capacity. A released slot
/// keeps its generation, so IDs handed out before the release stay invalid
/// after the slot is reused.
#[derive(Debug)]
pub struct IdAllocator {
    slots: Vec<Slot>,
    free: Vec<u16>,
    capacity: usize,
    live: usize,
}

impl IdAllocator {
    /// Creates an allocator able to hold `capacity` live IDs.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `capacity` exceeds [`MAX_ENTITY_CAPACITY`].
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity <= MAX_ENTITY_CAPACITY, "capacity exceeds the 16-bit index space");
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            capacity: capacity.min(MAX_ENTITY_CAPACITY),
            live: 0,
        }
    }

    /// Claims a fresh ID.
    ///
    /// # Returns
    ///
    /// `None` when every slot is in use.
    pub fn claim(&mut self) -> Option<EntityId> {
        let index = match self.free.pop() {
            Some(index) => index,
            None if self.slots.len() < self.capacity => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u16
            }
            None => return None,
        };

        let slot = &mut self.slots[usize::from(index)];
        slot.generation = if slot.generation == u16::MAX { 1 } else { slot.generation + 1 };
        slot.in_use = true;
        self.live += 1;
        Some(EntityId::new(index, slot.generation))
    }

    /// Releases an ID so its slot can be reused.
    ///
    /// # Returns
    ///
    /// `false` if the ID was not live.
    pub fn release(&mut self, id: EntityId) -> bool {
        if !self.is_valid(id) {
            return false;
        }
        self.slots[usize::from(id.index())].in_use = false;
        self.free.push(id.index());
        self.live -= 1;
        true
    }

    /// Checks that the ID is in use and carries the current generation.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, id: EntityId) -> bool {
        !id.is_null()
            && self
                .slots
                .get(usize::from(id.index()))
                .is_some_and(|slot| slot.in_use && slot.generation == id.generation())
    }

    /// Releases every ID. Generations are kept.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            slot.in_use = false;
            self.free.push(index as u16);
        }
        self.live = 0;
    }

    /// Iterates live IDs in index order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.in_use)
            .map(|(index, slot)| EntityId::new(index as u16, slot.generation))
    }

    /// Returns the number of live IDs.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Checks if no ID is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Returns the maximum number of live IDs.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
