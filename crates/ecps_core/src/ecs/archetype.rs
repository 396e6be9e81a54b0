//! # Archetype Storage
//!
//! Entities with the same exact component set share one archetype: a
//! dense byte buffer of fixed-stride records.
//!
//! ```text
//! Archetype {ID, Enabled, Position, Velocity}:
//! [ID0 P0 V0][ID1 P1 V1][0000 .. ..][ID3 P3 V3]
//!             free slot --^
//! ```
//!
//! ## Record Layout
//!
//! Components are laid out in ID order. The builtin `ID` component is
//! always present and always at offset 0, so the leading four bytes of a
//! record hold the owner's packed [`EntityId`]. Zero marks a free slot.
//!
//! Offsets are rounded up to each component's alignment and the stride to
//! the largest alignment present. Buffers are 16-byte aligned, which makes
//! every component offset a valid address for typed access.
//!
//! ## Directory
//!
//! The entity directory maps an entity index to its (archetype, offset)
//! location. It grows lazily; new entries default to absent.

use bytemuck::{Pod, Zeroable};

use super::component::{ComponentId, ComponentRegistry};
use super::entity::EntityId;
use super::flags::ComponentFlags;

/// Byte width of the leading ID field.
const ID_FIELD_SIZE: usize = std::mem::size_of::<u32>();

/// Backing unit of archetype buffers. Guarantees 16-byte alignment.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, align(16))]
struct Block([u8; 16]);

const BLOCK_SIZE: usize = std::mem::size_of::<Block>();

#[inline]
const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

// ============================================================================
// LAYOUT
// ============================================================================

/// Position of one component inside a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    /// Byte offset from the record start.
    pub offset: usize,
    /// Payload size in bytes.
    pub size: usize,
}

/// Offset table of an archetype, indexed by component ID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordLayout {
    fields: Vec<Option<Field>>,
    stride: usize,
}

impl RecordLayout {
    /// Builds the layout for a flag set.
    ///
    /// Scans registered types in ID order and assigns increasing offsets to
    /// every type present, plus `ID` unconditionally.
    #[must_use]
    pub fn new(flags: &ComponentFlags, registry: &ComponentRegistry) -> Self {
        let mut fields = vec![None; registry.len()];
        let mut cursor = 0;
        let mut max_align = 1;

        for (id, ty) in registry.iter() {
            if id != ComponentId::ID && !flags.is_on(id) {
                continue;
            }
            let offset = align_up(cursor, ty.align());
            fields[id.index()] = Some(Field { offset, size: ty.size() });
            cursor = offset + ty.size();
            max_align = max_align.max(ty.align());
        }

        Self {
            fields,
            stride: align_up(cursor, max_align),
        }
    }

    /// Returns the field of a component, `None` if absent.
    #[inline]
    #[must_use]
    pub fn field(&self, id: ComponentId) -> Option<Field> {
        self.fields.get(id.index()).copied().flatten()
    }

    /// Returns the byte offset of a component, `None` if absent.
    #[inline]
    #[must_use]
    pub fn offset_of(&self, id: ComponentId) -> Option<usize> {
        self.field(id).map(|field| field.offset)
    }

    /// Checks whether a component is part of the layout.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.field(id).is_some()
    }

    /// Returns the record size in bytes.
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Iterates present components with their fields, in ID order.
    pub fn fields(&self) -> impl Iterator<Item = (ComponentId, Field)> + '_ {
        self.fields
            .iter()
            .enumerate()
            .filter_map(|(index, field)| field.map(|field| (ComponentId::from_index(index), field)))
    }
}

/// Copies a record between two layouts.
///
/// For every component present in both layouts the bytes are copied;
/// present only in `to`, the bytes are zero-filled; present only in `from`,
/// the bytes are dropped.
pub fn copy_entity(from: &[u8], from_layout: &RecordLayout, to: &mut [u8], to_layout: &RecordLayout) {
    for (id, to_field) in to_layout.fields() {
        let dst = &mut to[to_field.offset..to_field.offset + to_field.size];
        match from_layout.field(id) {
            Some(from_field) => {
                debug_assert_eq!(from_field.size, to_field.size, "layouts disagree on size");
                dst.copy_from_slice(&from[from_field.offset..from_field.offset + from_field.size]);
            }
            None => dst.fill(0),
        }
    }
}

// ============================================================================
// ARCHETYPE
// ============================================================================

/// Dense storage for every entity with one exact component set.
pub struct Archetype {
    flags: ComponentFlags,
    layout: RecordLayout,
    blocks: Vec<Block>,
    slots: usize,
    live: usize,
}

impl Archetype {
    fn new(flags: ComponentFlags, layout: RecordLayout, initial_records: usize) -> Self {
        let blocks = (initial_records * layout.stride()).div_ceil(BLOCK_SIZE);
        Self {
            flags,
            layout,
            blocks: Vec::with_capacity(blocks),
            slots: 0,
            live: 0,
        }
    }

    /// Returns the component set.
    #[inline]
    #[must_use]
    pub fn flags(&self) -> &ComponentFlags {
        &self.flags
    }

    /// Returns the record layout.
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Number of records, free slots included.
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots
    }

    /// Number of occupied records.
    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Raw record bytes, free slots included.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<Block, u8>(&self.blocks)[..self.slots * self.layout.stride()]
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.slots * self.layout.stride();
        &mut bytemuck::cast_slice_mut::<Block, u8>(&mut self.blocks)[..len]
    }

    /// Returns the record starting at `offset`.
    #[inline]
    #[must_use]
    pub fn record(&self, offset: usize) -> &[u8] {
        &self.bytes()[offset..offset + self.layout.stride()]
    }

    /// Returns the record starting at `offset`, mutably.
    #[inline]
    pub fn record_mut(&mut self, offset: usize) -> &mut [u8] {
        let stride = self.layout.stride();
        &mut self.bytes_mut()[offset..offset + stride]
    }

    /// Reads the leading ID field of the record at `offset`.
    #[inline]
    #[must_use]
    pub fn id_at(&self, offset: usize) -> EntityId {
        EntityId::from_bits(bytemuck::pod_read_unaligned(
            &self.bytes()[offset..offset + ID_FIELD_SIZE],
        ))
    }

    /// Iterates occupied records as `(id, offset)`, in storage order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, usize)> + '_ {
        let stride = self.layout.stride();
        (0..self.slots)
            .map(move |slot| slot * stride)
            .map(|offset| (self.id_at(offset), offset))
            .filter(|(id, _)| !id.is_null())
    }

    /// Finds a free record or grows the buffer by one.
    ///
    /// # Returns
    ///
    /// Byte offset of the slot. The slot is zeroed and its ID field still
    /// holds the free sentinel.
    pub fn allocate_slot(&mut self) -> usize {
        let stride = self.layout.stride();
        if self.live < self.slots {
            if let Some(slot) = (0..self.slots).find(|slot| self.id_at(slot * stride).is_null()) {
                self.live += 1;
                return slot * stride;
            }
        }

        let offset = self.slots * stride;
        self.slots += 1;
        let blocks = (self.slots * stride).div_ceil(BLOCK_SIZE);
        self.blocks.resize(blocks, Block::zeroed());
        self.live += 1;
        offset
    }

    /// Zeroes the record at `offset`, restoring the free sentinel.
    pub fn free_slot(&mut self, offset: usize) {
        debug_assert!(offset % self.layout.stride() == 0, "misaligned record offset");
        self.record_mut(offset).fill(0);
        self.live -= 1;
    }

    fn write_id(&mut self, offset: usize, id: EntityId) {
        self.record_mut(offset)[..ID_FIELD_SIZE].copy_from_slice(&id.to_bits().to_ne_bytes());
    }

    fn clear(&mut self) {
        self.blocks.clear();
        self.slots = 0;
        self.live = 0;
    }
}

impl std::fmt::Debug for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archetype")
            .field("flags", &self.flags)
            .field("stride", &self.layout.stride())
            .field("slots", &self.slots)
            .field("live", &self.live)
            .finish()
    }
}

// ============================================================================
// STORE + DIRECTORY
// ============================================================================

/// Where an entity's record lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityLocation {
    /// Archetype index, in creation order.
    pub archetype: usize,
    /// Byte offset of the record inside the archetype buffer.
    pub offset: usize,
}

/// All archetypes of one instance plus the entity directory.
#[derive(Debug, Default)]
pub struct ArchetypeStore {
    archetypes: Vec<Archetype>,
    directory: Vec<Option<EntityLocation>>,
    initial_records: usize,
}

impl ArchetypeStore {
    /// Creates an empty store.
    ///
    /// # Arguments
    ///
    /// * `directory_capacity` - Directory entries reserved up front
    /// * `initial_records` - Records reserved by every new archetype
    #[must_use]
    pub fn new(directory_capacity: usize, initial_records: usize) -> Self {
        Self {
            archetypes: Vec::new(),
            directory: Vec::with_capacity(directory_capacity),
            initial_records,
        }
    }

    /// Finds the archetype with exactly these flags or creates it.
    ///
    /// `ID` is always added to the flags.
    pub fn create_or_find(&mut self, flags: &ComponentFlags, registry: &ComponentRegistry) -> usize {
        let mut flags = *flags;
        flags.set_on(ComponentId::ID);

        if let Some(index) = self.archetypes.iter().position(|arch| arch.flags.compare_exact(&flags)) {
            return index;
        }

        let layout = RecordLayout::new(&flags, registry);
        tracing::trace!(archetype = self.archetypes.len(), stride = layout.stride(), "archetype created");
        self.archetypes.push(Archetype::new(flags, layout, self.initial_records));
        self.archetypes.len() - 1
    }

    /// Number of archetypes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Checks if no archetype exists yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Returns an archetype by index.
    #[inline]
    #[must_use]
    pub fn archetype(&self, index: usize) -> Option<&Archetype> {
        self.archetypes.get(index)
    }

    /// Iterates archetypes in creation order.
    pub fn archetypes(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }

    /// Looks up the record of a live entity.
    ///
    /// The directory entry must exist and the record's leading ID must
    /// equal `id`, which rejects stale generations.
    #[must_use]
    pub fn location(&self, id: EntityId) -> Option<EntityLocation> {
        if id.is_null() {
            return None;
        }
        let location = self.directory.get(usize::from(id.index())).copied().flatten()?;
        (self.occupant(location) == Some(id)).then_some(location)
    }

    /// Reads the ID stored at a location.
    ///
    /// `None` if the location lies outside every buffer. A free record
    /// reads as [`EntityId::NULL`].
    #[must_use]
    pub fn occupant(&self, location: EntityLocation) -> Option<EntityId> {
        let archetype = self.archetypes.get(location.archetype)?;
        let field = archetype.bytes().get(location.offset..location.offset + ID_FIELD_SIZE)?;
        Some(EntityId::from_bits(bytemuck::pod_read_unaligned(field)))
    }

    /// Checks that `id` still lives at `location`.
    #[inline]
    #[must_use]
    pub fn is_current(&self, id: EntityId, location: EntityLocation) -> bool {
        !id.is_null() && self.occupant(location) == Some(id)
    }

    /// Checks whether an entity has a record.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.location(id).is_some()
    }

    /// Returns the flags of the archetype holding a location.
    #[inline]
    #[must_use]
    pub fn flags_at(&self, location: EntityLocation) -> Option<&ComponentFlags> {
        self.archetypes.get(location.archetype).map(|archetype| &archetype.flags)
    }

    /// Returns a component payload at a location.
    #[must_use]
    pub fn component(&self, location: EntityLocation, id: ComponentId) -> Option<&[u8]> {
        let archetype = self.archetypes.get(location.archetype)?;
        let field = archetype.layout.field(id)?;
        let start = location.offset + field.offset;
        archetype.bytes().get(start..start + field.size)
    }

    /// Returns a component payload at a location, mutably.
    pub fn component_mut(&mut self, location: EntityLocation, id: ComponentId) -> Option<&mut [u8]> {
        let archetype = self.archetypes.get_mut(location.archetype)?;
        let field = archetype.layout.field(id)?;
        let start = location.offset + field.offset;
        archetype.bytes_mut().get_mut(start..start + field.size)
    }

    /// Gives a new entity a zeroed record in the archetype for `flags`.
    pub fn insert(&mut self, id: EntityId, flags: &ComponentFlags, registry: &ComponentRegistry) -> EntityLocation {
        let archetype = self.create_or_find(flags, registry);
        let offset = self.archetypes[archetype].allocate_slot();
        self.archetypes[archetype].write_id(offset, id);

        let location = EntityLocation { archetype, offset };
        self.set_location(id, location);
        location
    }

    /// Moves an entity into the archetype for `flags`.
    ///
    /// Shared components keep their bytes, new ones start zeroed and
    /// dropped ones are discarded. Cleanup of dropped payloads is the
    /// caller's job and must happen before this call.
    pub fn migrate(
        &mut self,
        from: EntityLocation,
        flags: &ComponentFlags,
        registry: &ComponentRegistry,
    ) -> EntityLocation {
        let target = self.create_or_find(flags, registry);
        if target == from.archetype {
            return from;
        }

        let id = self.archetypes[from.archetype].id_at(from.offset);
        let offset = self.archetypes[target].allocate_slot();
        {
            let (src, dst) = self.pair_mut(from.archetype, target);
            let stride = dst.layout.stride();
            let to_record = &mut bytemuck::cast_slice_mut::<Block, u8>(&mut dst.blocks)[offset..offset + stride];
            copy_entity(src.record(from.offset), &src.layout, to_record, &dst.layout);
        }
        self.archetypes[from.archetype].free_slot(from.offset);

        let location = EntityLocation { archetype: target, offset };
        self.set_location(id, location);
        location
    }

    /// Frees an entity's record and clears its directory entry.
    pub fn remove(&mut self, id: EntityId, location: EntityLocation) {
        self.archetypes[location.archetype].free_slot(location.offset);
        if let Some(entry) = self.directory.get_mut(usize::from(id.index())) {
            *entry = None;
        }
    }

    /// Drops every record. Archetypes and their layouts are kept.
    pub fn clear(&mut self) {
        for archetype in &mut self.archetypes {
            archetype.clear();
        }
        self.directory.clear();
    }

    fn set_location(&mut self, id: EntityId, location: EntityLocation) {
        let index = usize::from(id.index());
        if index >= self.directory.len() {
            self.directory.resize(index + 1, None);
        }
        self.directory[index] = Some(location);
    }

    fn pair_mut(&mut self, a: usize, b: usize) -> (&mut Archetype, &mut Archetype) {
        debug_assert_ne!(a, b, "pair_mut needs two distinct archetypes");
        if a < b {
            let (left, right) = self.archetypes.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }
}
